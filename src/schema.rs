//! JSON Schema resolution.
//!
//! Mapping works on the *effective item schema*: the object schema describing
//! one record's fields. It is found by unwrapping, in order:
//!
//! 1. a `cells` property (object, or array whose `items` has properties),
//! 2. the root `properties`,
//! 3. one level of `items` when the root is an array.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, XlmapError};

/// Metadata for one schema field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SchemaFieldMeta {
    /// Raw `type` keyword (a string or a list of strings).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaFieldMeta {
    pub fn from_value(value: &Value) -> Self {
        Self {
            kind: value.get("type").cloned(),
            title: value.get("title").and_then(Value::as_str).map(str::to_string),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// `type: "array"` or a type list containing `"array"`.
    pub fn is_array(&self) -> bool {
        match &self.kind {
            Some(Value::String(t)) => t == "array",
            Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("array")),
            _ => false,
        }
    }
}

/// Output shape selected by the schema root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    /// Object root whose `cells` property is an array: one entry per record.
    CellsArray,
    /// Array root: one `{cells}` object per record.
    ArrayRoot,
    /// Plain object root: only the last record is exported.
    PlainObject,
}

/// Flattened view of a schema: field metadata in declaration order plus the
/// required list of the effective item schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIndex {
    pub shape: SchemaShape,
    pub properties: IndexMap<String, SchemaFieldMeta>,
    pub required: Vec<String>,
}

impl SchemaIndex {
    pub fn from_schema(schema: &Value) -> Result<Self> {
        if !schema.is_object() {
            return Err(XlmapError::SchemaNotObject);
        }
        let properties = resolve_properties(schema).ok_or(XlmapError::SchemaMissingProperties)?;
        Ok(Self {
            shape: schema_shape(schema),
            properties,
            required: resolve_required(schema),
        })
    }

    pub fn field_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn field(&self, name: &str) -> Option<&SchemaFieldMeta> {
        self.properties.get(name)
    }

    pub fn is_array_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(SchemaFieldMeta::is_array)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

fn properties_of(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

/// The object schema holding the record's fields, if any level has one.
fn effective_item_schema(schema: &Value) -> Option<&Value> {
    fn unwrap_level(level: &Value) -> Option<&Value> {
        let props = properties_of(level)?;
        if let Some(cells) = props.get("cells") {
            if properties_of(cells).is_some() {
                return Some(cells);
            }
            if let Some(items) = cells.get("items").filter(|i| properties_of(i).is_some()) {
                return Some(items);
            }
        }
        Some(level)
    }

    unwrap_level(schema).or_else(|| {
        if schema.get("type").and_then(Value::as_str) == Some("array") {
            schema.get("items").and_then(unwrap_level)
        } else {
            None
        }
    })
}

/// Field → metadata of the effective item schema, or `None` when no level
/// declares `properties`.
pub fn resolve_properties(schema: &Value) -> Option<IndexMap<String, SchemaFieldMeta>> {
    let props = properties_of(effective_item_schema(schema)?)?;
    Some(
        props
            .iter()
            .map(|(name, meta)| (name.clone(), SchemaFieldMeta::from_value(meta)))
            .collect(),
    )
}

/// `required` of the effective item schema (empty when absent).
pub fn resolve_required(schema: &Value) -> Vec<String> {
    effective_item_schema(schema)
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn schema_shape(schema: &Value) -> SchemaShape {
    if schema.get("type").and_then(Value::as_str) == Some("array") {
        return SchemaShape::ArrayRoot;
    }
    let cells_is_array = properties_of(schema)
        .and_then(|p| p.get("cells"))
        .is_some_and(|cells| SchemaFieldMeta::from_value(cells).is_array());
    if cells_is_array {
        SchemaShape::CellsArray
    } else {
        SchemaShape::PlainObject
    }
}

/// Parse schema text pasted or uploaded by the user.
pub fn parse_schema(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| XlmapError::InvalidSchemaJson(e.to_string()))
}

/// Field names of a schema, failing when it has no resolvable properties.
pub fn schema_field_names(schema: &Value) -> Result<Vec<String>> {
    Ok(SchemaIndex::from_schema(schema)?.field_names())
}

/// UI label: left of the first colon in `description`, else `title`, else
/// `fallback`.
pub fn label_from_meta(meta: Option<&SchemaFieldMeta>, fallback: &str) -> String {
    meta.and_then(|m| {
        m.description
            .as_deref()
            .map(truncate_description)
            .filter(|d| !d.is_empty())
            .or(m.title.as_deref().filter(|t| !t.is_empty()))
    })
    .unwrap_or(fallback)
    .to_string()
}

/// Left side of the first colon, or the whole string.
pub fn truncate_description(desc: &str) -> &str {
    desc.split_once(':').map_or(desc, |(left, _)| left)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate_description("Name: the full name"), "Name");
        assert_eq!(truncate_description("No colon"), "No colon");
        assert_eq!(truncate_description(":lead"), "");
    }

    #[test]
    fn test_label_preference_order() {
        let meta = SchemaFieldMeta::from_value(&json!({"title": "T", "description": "D: more"}));
        assert_eq!(label_from_meta(Some(&meta), "f"), "D");

        let meta = SchemaFieldMeta::from_value(&json!({"title": "T", "description": ":x"}));
        assert_eq!(label_from_meta(Some(&meta), "f"), "T");

        assert_eq!(label_from_meta(None, "f"), "f");
    }

    #[test]
    fn test_type_list_counts_as_array() {
        let meta = SchemaFieldMeta::from_value(&json!({"type": ["array", "null"]}));
        assert!(meta.is_array());
        let meta = SchemaFieldMeta::from_value(&json!({"type": "string"}));
        assert!(!meta.is_array());
    }

    #[test]
    fn test_parse_schema_reports_syntax_errors() {
        assert!(matches!(
            parse_schema("{not json"),
            Err(XlmapError::InvalidSchemaJson(_))
        ));
        assert!(parse_schema(r#"{"properties": {}}"#).is_ok());
    }
}
