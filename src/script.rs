//! Movement scripts evaluated in an embedded Rhai sandbox.
//!
//! A script sees six constants: `row`, `col`, `sheet`, `field`, `index` and
//! `mapping` (the whole working mapping as an object map). It returns either
//! a number, added to the current row, or a map with optional `row` / `col`
//! keys giving absolute coordinates:
//!
//! ```text
//! if row > 10 { #{ row: 0, col: col + 3 } } else { 2 }
//! ```
//!
//! The engine is built raw (no module resolver, no I/O) with operation,
//! expression-depth and string-size limits from [`ScriptLimits`].

use rhai::packages::{Package, StandardPackage};
use rhai::{Dynamic, Engine, Map, Scope};

use crate::config::ScriptLimits;
use crate::movement::{ScriptContext, ScriptError, ScriptEvaluator, ScriptOutcome};

pub struct RhaiEvaluator {
    engine: Engine,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new(&ScriptLimits::default())
    }
}

impl std::fmt::Debug for RhaiEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiEvaluator").finish_non_exhaustive()
    }
}

impl RhaiEvaluator {
    pub fn new(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new_raw();
        engine.register_global_module(StandardPackage::new().as_shared_module());
        engine.set_max_operations(limits.max_operations);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_call_levels(limits.max_expr_depth);
        Self { engine }
    }
}

impl ScriptEvaluator for RhaiEvaluator {
    fn evaluate(
        &self,
        script: &str,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptOutcome, ScriptError> {
        let mapping = rhai::serde::to_dynamic(ctx.mapping)
            .map_err(|e| ScriptError::Eval(e.to_string()))?;

        let mut scope = Scope::new();
        scope.push_constant("row", i64::from(ctx.row));
        scope.push_constant("col", i64::from(ctx.col));
        scope.push_constant("sheet", ctx.sheet.to_string());
        scope.push_constant("field", ctx.field.to_string());
        scope.push_constant("index", i64::try_from(ctx.index).unwrap_or(i64::MAX));
        scope.push_constant_dynamic("mapping", mapping);

        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, script)
            .map_err(|e| ScriptError::Eval(e.to_string()))?;
        outcome_from_dynamic(result)
    }
}

fn outcome_from_dynamic(value: Dynamic) -> Result<ScriptOutcome, ScriptError> {
    if let Some(delta) = number_from_dynamic(&value) {
        return Ok(ScriptOutcome::RowDelta(delta));
    }
    let type_name = value.type_name().to_string();
    let Some(map) = value.try_cast::<Map>() else {
        return Err(ScriptError::Malformed(type_name));
    };
    let axis = |key: &str| -> Result<Option<i64>, ScriptError> {
        match map.get(key) {
            None => Ok(None),
            Some(v) if v.is_unit() => Ok(None),
            Some(v) => number_from_dynamic(v)
                .map(Some)
                .ok_or_else(|| ScriptError::Malformed(format!("{key}: {}", v.type_name()))),
        }
    };
    let row = axis("row")?;
    let col = axis("col")?;
    if row.is_none() && col.is_none() {
        return Err(ScriptError::Malformed("map without row or col".into()));
    }
    Ok(ScriptOutcome::Absolute { row, col })
}

/// Integers pass through; finite floats are truncated toward zero.
fn number_from_dynamic(value: &Dynamic) -> Option<i64> {
    if let Ok(n) = value.as_int() {
        return Some(n);
    }
    let f = value.as_float().ok()?;
    if !f.is_finite() || f.abs() >= 9.0e15 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(f.trunc() as i64)
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
    use crate::types::{CellAddress, Mapping};

    fn eval(script: &str) -> Result<ScriptOutcome, ScriptError> {
        let mut mapping = Mapping::new();
        mapping.insert(
            "total".into(),
            vec![CellAddress::new("Sheet1", 4, 1), CellAddress::new("Sheet1", 9, 1)],
        );
        let ctx = ScriptContext {
            row: 4,
            col: 1,
            sheet: "Sheet1",
            field: "total",
            index: 1,
            mapping: &mapping,
        };
        RhaiEvaluator::default().evaluate(script, &ctx)
    }

    #[test]
    fn test_number_is_row_delta() {
        assert_eq!(eval("3").unwrap(), ScriptOutcome::RowDelta(3));
        assert_eq!(eval("row - 5").unwrap(), ScriptOutcome::RowDelta(-1));
        assert_eq!(eval("2.9").unwrap(), ScriptOutcome::RowDelta(2));
    }

    #[test]
    fn test_map_is_absolute() {
        assert_eq!(
            eval("#{ row: 0, col: col + 2 }").unwrap(),
            ScriptOutcome::Absolute {
                row: Some(0),
                col: Some(3)
            }
        );
        assert_eq!(
            eval("#{ col: 7 }").unwrap(),
            ScriptOutcome::Absolute {
                row: None,
                col: Some(7)
            }
        );
    }

    #[test]
    fn test_all_inputs_are_visible() {
        let script = r#"
            if sheet == "Sheet1" && field == "total" && index == 1 {
                mapping.total[0].row
            } else {
                -100
            }
        "#;
        assert_eq!(eval(script).unwrap(), ScriptOutcome::RowDelta(4));
    }

    #[test]
    fn test_errors_and_malformed_results() {
        assert!(matches!(eval("let x = ;"), Err(ScriptError::Eval(_))));
        assert!(matches!(eval("undefined_var + 1"), Err(ScriptError::Eval(_))));
        assert!(matches!(eval(r#""down""#), Err(ScriptError::Malformed(_))));
        assert!(matches!(eval("#{ other: 1 }"), Err(ScriptError::Malformed(_))));
        assert!(matches!(eval("#{ row: \"x\" }"), Err(ScriptError::Malformed(_))));
    }

    #[test]
    fn test_runaway_script_is_stopped() {
        assert!(matches!(eval("loop { }"), Err(ScriptError::Eval(_))));
    }

    #[test]
    fn test_inputs_are_read_only() {
        assert!(matches!(eval("row = 10; row"), Err(ScriptError::Eval(_))));
    }
}
