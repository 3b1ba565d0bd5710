//! Tests for schema resolution and field labels.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

mod fixtures;

use serde_json::{json, Value};
use test_case::test_case;
use xlmap::schema::{
    label_from_meta, parse_schema, resolve_properties, resolve_required, schema_field_names,
    schema_shape, SchemaIndex, SchemaShape,
};
use xlmap::XlmapError;

use fixtures::SchemaBuilder;

fn names(schema: &Value) -> Vec<String> {
    resolve_properties(schema)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default()
}

// ============================================================================
// PROPERTY RESOLUTION
// ============================================================================

#[test]
fn test_plain_properties() {
    let schema = json!({"properties": {"a": {}, "b": {}}, "required": ["b"]});
    assert_eq!(names(&schema), vec!["a", "b"]);
    assert_eq!(resolve_required(&schema), vec!["b"]);
    assert_eq!(schema_shape(&schema), SchemaShape::PlainObject);
}

#[test]
fn test_cells_object_wrapper() {
    let schema = json!({
        "properties": {
            "cells": {"type": "object", "properties": {"x": {}, "y": {}}, "required": ["x"]}
        }
    });
    assert_eq!(names(&schema), vec!["x", "y"]);
    assert_eq!(resolve_required(&schema), vec!["x"]);
    assert_eq!(schema_shape(&schema), SchemaShape::PlainObject);
}

#[test]
fn test_cells_array_wrapper() {
    let schema = SchemaBuilder::new()
        .cells_array()
        .string("x")
        .required(&["x"])
        .build();
    assert_eq!(names(&schema), vec!["x"]);
    assert_eq!(resolve_required(&schema), vec!["x"]);
    assert_eq!(schema_shape(&schema), SchemaShape::CellsArray);
}

#[test]
fn test_array_root() {
    let schema = SchemaBuilder::new().array_root().string("x").build();
    assert_eq!(names(&schema), vec!["x"]);
    assert_eq!(schema_shape(&schema), SchemaShape::ArrayRoot);
}

#[test]
fn test_array_root_with_cells_items() {
    let schema = json!({
        "type": "array",
        "items": {"properties": {"cells": {"properties": {"deep": {}}}}}
    });
    assert_eq!(names(&schema), vec!["deep"]);
}

#[test_case(json!({}) ; "empty object")]
#[test_case(json!({"type": "array"}) ; "array without items")]
#[test_case(json!({"type": "array", "items": {"type": "string"}}) ; "scalar items")]
#[test_case(json!({"properties": "nope"}) ; "properties not an object")]
fn test_no_properties(schema: Value) {
    assert!(resolve_properties(&schema).is_none());
    assert!(matches!(
        SchemaIndex::from_schema(&schema),
        Err(XlmapError::SchemaMissingProperties)
    ));
    assert!(matches!(
        schema_field_names(&schema),
        Err(XlmapError::SchemaMissingProperties)
    ));
}

#[test]
fn test_non_object_schema() {
    assert!(matches!(
        SchemaIndex::from_schema(&json!([1, 2])),
        Err(XlmapError::SchemaNotObject)
    ));
}

#[test]
fn test_index_flags() {
    let schema = SchemaBuilder::new()
        .string("title")
        .array("lines")
        .field("maybe", json!({"type": ["array", "null"]}))
        .required(&["title"])
        .build();
    let index = SchemaIndex::from_schema(&schema).unwrap();
    assert!(index.is_array_field("lines"));
    assert!(index.is_array_field("maybe"));
    assert!(!index.is_array_field("title"));
    assert!(!index.is_array_field("missing"));
    assert!(index.is_required("title"));
    assert!(!index.is_required("lines"));
    assert_eq!(index.field_names(), vec!["title", "lines", "maybe"]);
}

// ============================================================================
// TEXT AND LABELS
// ============================================================================

#[test]
fn test_parse_schema_text() {
    let schema = parse_schema(r#"{"properties": {"a": {"title": "A"}}}"#).unwrap();
    assert_eq!(schema_field_names(&schema).unwrap(), vec!["a"]);
    let err = parse_schema("{\"properties\": ").unwrap_err();
    assert!(err.to_string().starts_with("Invalid JSON syntax"));
}

#[test_case(json!({"description": "Invoice number: printed top right", "title": "No."}), "Invoice number" ; "description before colon")]
#[test_case(json!({"description": "Plain description"}), "Plain description" ; "description without colon")]
#[test_case(json!({"title": "Nice title"}), "Nice title" ; "title fallback")]
#[test_case(json!({}), "field_key" ; "key fallback")]
fn test_labels(meta: Value, expected: &str) {
    let schema = json!({"properties": {"field_key": meta}});
    let index = SchemaIndex::from_schema(&schema).unwrap();
    assert_eq!(label_from_meta(index.field("field_key"), "field_key"), expected);
}
