//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_JUMP_SEARCH_FACTOR: usize = 4;
const DEFAULT_MAX_OPERATIONS: u64 = 100_000;
const DEFAULT_MAX_EXPR_DEPTH: usize = 64;
const DEFAULT_MAX_STRING_SIZE: usize = 4096;

/// What "Confirm & Next" does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmNextMode {
    /// Snapshot the mapping, then advance every address by its movement.
    #[default]
    ShiftRow,
    /// Snapshot the mapping, then focus the next schema field.
    AdvanceField,
}

impl std::fmt::Display for ConfirmNextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmNextMode::ShiftRow => write!(f, "shiftRow"),
            ConfirmNextMode::AdvanceField => write!(f, "advanceField"),
        }
    }
}

/// Resource limits applied to movement scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_expr_depth: DEFAULT_MAX_EXPR_DEPTH,
            max_string_size: DEFAULT_MAX_STRING_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapperConfig {
    pub confirm_next_mode: ConfirmNextMode,
    /// Jump-next gives up after `max(1, rows * factor)` steps.
    pub jump_search_factor: usize,
    pub script: ScriptLimits,
    /// Lowercase field name → A1 cell pre-filled by auto-detect.
    pub auto_detect_rules: IndexMap<String, String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        let mut rules = IndexMap::new();
        rules.insert("title".to_string(), "A1".to_string());
        rules.insert("description".to_string(), "B1".to_string());
        Self {
            confirm_next_mode: ConfirmNextMode::default(),
            jump_search_factor: DEFAULT_JUMP_SEARCH_FACTOR,
            script: ScriptLimits::default(),
            auto_detect_rules: rules,
        }
    }
}

impl MapperConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
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

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(MapperConfig::from_json_str("{}").unwrap(), MapperConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = MapperConfig::from_json_str(
            r#"{"confirmNextMode": "advanceField", "script": {"maxOperations": 10}}"#,
        )
        .unwrap();
        assert_eq!(cfg.confirm_next_mode, ConfirmNextMode::AdvanceField);
        assert_eq!(cfg.script.max_operations, 10);
        assert_eq!(cfg.script.max_expr_depth, DEFAULT_MAX_EXPR_DEPTH);
        assert_eq!(cfg.jump_search_factor, DEFAULT_JUMP_SEARCH_FACTOR);
        assert_eq!(cfg.auto_detect_rules.get("title").map(String::as_str), Some("A1"));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(MapperConfig::from_json_str(r#"{"confirmNextMode": "sideways"}"#).is_err());
    }
}
