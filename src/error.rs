//! Structured error types for xlmap.
//!
//! Only programmer/configuration mistakes surface as errors. Data-shape edge
//! cases produced by user interaction (out-of-bounds moves, duplicate drops,
//! failing movement scripts) are recovered where they happen and never reach
//! this type.

/// All errors that can be returned to callers of the mapping engine.
#[derive(Debug, thiserror::Error)]
pub enum XlmapError {
    /// `Store::set` was called with a key that is not part of the state.
    #[error("Unknown state key: {0}")]
    UnknownKey(String),

    /// A value passed to `Store::set` does not have the shape of its slot.
    #[error("Invalid value for state key {key}: {source}")]
    InvalidValue {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The schema resolves to no `properties` at any supported level.
    #[error("Schema missing \"properties\"")]
    SchemaMissingProperties,

    /// The schema root is not a JSON object.
    #[error("Schema must be an object")]
    SchemaNotObject,

    /// Schema text could not be parsed as JSON.
    #[error("Invalid JSON syntax: {0}")]
    InvalidSchemaJson(String),

    /// The plain-object export shape needs at least one confirmed record.
    #[error("No confirmed records to export")]
    NoConfirmedRecords,

    /// An operation needs a piece of state that has not been loaded yet.
    #[error("Missing {0}")]
    MissingState(&'static str),

    /// Workbook payload violates its own invariants.
    #[error("Invalid workbook: {0}")]
    InvalidWorkbook(String),

    /// A movement config combines more than one strategy.
    #[error("Invalid movement config: {0}")]
    InvalidMovement(String),

    /// Mapping template could not be read.
    #[error("{0}")]
    InvalidTemplate(String),

    /// Invalid A1 cell reference.
    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    /// JSON (de)serialization failure.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlmapError>;

impl From<XlmapError> for wasm_bindgen::JsValue {
    fn from(e: XlmapError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
