//! Tests for the JavaScript surface, run with `wasm-pack test --node`.
#![cfg(target_arch = "wasm32")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use js_sys::{Array, Function, Reflect};
use serde_json::{json, Value};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::wasm_bindgen_test;
use xlmap::XlMap;

fn js(value: &Value) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap()
}

fn session() -> XlMap {
    let map = XlMap::new(JsValue::UNDEFINED).unwrap();
    map.set(
        "workbook",
        js(&json!({
            "sheets": ["Sheet1"],
            "activeSheet": "Sheet1",
            "data": {"Sheet1": [["Alice"], ["Bob"]]}
        })),
    )
    .unwrap();
    map.set(
        "schema",
        js(&json!({"properties": {"title": {"type": "string"}}})),
    )
    .unwrap();
    map
}

#[wasm_bindgen_test]
fn test_unknown_key_throws() {
    let map = XlMap::new(JsValue::UNDEFINED).unwrap();
    assert!(map.set("nope", JsValue::NULL).is_err());
}

#[wasm_bindgen_test]
fn test_drop_confirm_export() {
    let map = session();
    let dropped = map
        .dispatch_event(js(&json!({
            "type": "FIELD_DROPPED",
            "detail": {"field": "title", "row": 0, "col": 0}
        })))
        .unwrap();
    assert!(dropped);
    assert!(map.confirm_next().unwrap());
    let out: Value = serde_wasm_bindgen::from_value(map.build_json().unwrap()).unwrap();
    assert_eq!(
        out,
        json!({"cells": {"title": {"cell": "A1", "value": "Alice"}}})
    );
}

#[wasm_bindgen_test]
fn test_configure_movement_from_plain_object() {
    let map = session();
    map.field_dropped(js(&json!({"field": "title", "row": 0, "col": 0})))
        .unwrap();
    assert!(map
        .configure_movement("title", 0, js(&json!({"script": "1"})))
        .unwrap());
    assert!(map
        .configure_movement("title", 0, js(&json!({"dy": 1, "script": "1"})))
        .is_err());
}

#[wasm_bindgen_test]
fn test_subscribe_and_unsubscribe() {
    let mut map = session();
    let calls = Array::new();
    let push = Function::new_with_args("calls", "return (state, prev) => calls.push(prev === null);");
    let listener: Function = push.call1(&JsValue::NULL, &calls).unwrap().into();
    let id = map.subscribe(listener);
    assert_eq!(calls.length(), 1);
    assert_eq!(calls.get(0), JsValue::TRUE);

    map.set("currentFieldIndex", JsValue::from(0)).unwrap();
    assert_eq!(calls.length(), 2);
    assert_eq!(calls.get(1), JsValue::FALSE);

    assert!(map.unsubscribe(id));
    assert!(!map.unsubscribe(id));
    map.set("currentFieldIndex", JsValue::from(0)).unwrap();
    assert_eq!(calls.length(), 2);
}

#[wasm_bindgen_test]
fn test_state_is_a_plain_object() {
    let map = session();
    let state = map.get_state().unwrap();
    let sheet = Reflect::get(&state, &JsValue::from_str("workbook"))
        .and_then(|wb| Reflect::get(&wb, &JsValue::from_str("activeSheet")))
        .unwrap();
    assert_eq!(sheet.as_string().as_deref(), Some("Sheet1"));
}
