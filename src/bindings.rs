//! JavaScript surface.
//!
//! ```javascript
//! import init, { XlMap } from 'xlmap';
//! await init();
//! const map = new XlMap({ confirmNextMode: 'shiftRow' });
//! map.set('workbook', workbook);
//! map.set('schema', schema);
//! const id = map.subscribe((state, prev) => render(state));
//! map.dispatchEvent({ type: 'FIELD_DROPPED', detail: { field: 'title', row: 0, col: 0 } });
//! map.confirmNext();
//! const json = map.buildJson();
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use js_sys::Function;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::config::MapperConfig;
use crate::error::XlmapError;
use crate::events::{FieldDropped, MappingEvent, OverlayMoved};
use crate::mapper::Mapper;
use crate::store::{AppState, ListenerResult, Store, Subscription};
use crate::types::Movement;

/// Plain objects instead of `Map`s on the JS side.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// Read a JS value through `serde_json::Value` so integers stay integers.
fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    let json: Value = serde_wasm_bindgen::from_value(value)?;
    Ok(serde_json::from_value(json).map_err(XlmapError::from)?)
}

#[wasm_bindgen]
pub struct XlMap {
    mapper: Mapper,
    subscriptions: HashMap<u32, Subscription>,
    next_subscription: u32,
}

#[wasm_bindgen]
impl XlMap {
    /// `config` may be `undefined` for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<XlMap, JsValue> {
        console_error_panic_hook::set_once();
        let config: MapperConfig = if config.is_undefined() || config.is_null() {
            MapperConfig::default()
        } else {
            from_js(config)?
        };
        let store = Rc::new(Store::with_state(AppState {
            confirm_next_mode: config.confirm_next_mode,
            ..AppState::default()
        }));
        Ok(XlMap {
            mapper: Mapper::with_config(store, config),
            subscriptions: HashMap::new(),
            next_subscription: 0,
        })
    }

    // ========================================================================
    // Store
    // ========================================================================

    #[wasm_bindgen(js_name = "getState")]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        Ok(to_js(self.mapper.store().get_state().as_ref())?)
    }

    /// Set one state key. Unknown keys and mistyped values throw.
    pub fn set(&self, key: &str, value: JsValue) -> Result<(), JsValue> {
        let value: Value = serde_wasm_bindgen::from_value(value)?;
        Ok(self.mapper.store().set(key, value)?)
    }

    /// Register `callback(state, prevState)`; it runs once immediately with
    /// `prevState === null`. Returns an id for [`XlMap::unsubscribe`].
    pub fn subscribe(&mut self, callback: Function) -> u32 {
        let listener = move |state: &AppState, prev: Option<&AppState>| -> ListenerResult {
            let state = to_js(state)?;
            let prev = match prev {
                Some(prev) => to_js(prev)?,
                None => JsValue::NULL,
            };
            callback
                .call2(&JsValue::NULL, &state, &prev)
                .map_err(|e| format!("listener threw: {e:?}"))?;
            Ok(())
        };
        let subscription = self.mapper.store().subscribe(listener);
        let id = self.next_subscription;
        self.next_subscription = self.next_subscription.wrapping_add(1);
        self.subscriptions.insert(id, subscription);
        id
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.subscriptions
            .remove(&id)
            .is_some_and(Subscription::unsubscribe)
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    #[wasm_bindgen(js_name = "confirmAndAdvance")]
    pub fn confirm_and_advance(&self) -> bool {
        self.mapper.confirm_and_advance()
    }

    #[wasm_bindgen(js_name = "advanceCurrentField")]
    pub fn advance_current_field(&self) -> Result<bool, JsValue> {
        Ok(self.mapper.advance_current_field()?)
    }

    #[wasm_bindgen(js_name = "confirmNext")]
    pub fn confirm_next(&self) -> Result<bool, JsValue> {
        Ok(self.mapper.confirm_next()?)
    }

    pub fn undo(&self) -> bool {
        self.mapper.undo()
    }

    #[wasm_bindgen(js_name = "selectField")]
    pub fn select_field(&self, index: usize) -> Result<usize, JsValue> {
        Ok(self.mapper.select_field(index)?)
    }

    // ========================================================================
    // Events and editing
    // ========================================================================

    /// `{ type: 'FIELD_DROPPED' | 'OVERLAY_MOVED', detail }`
    #[wasm_bindgen(js_name = "dispatchEvent")]
    pub fn dispatch_event(&self, event: JsValue) -> Result<bool, JsValue> {
        let event: MappingEvent = from_js(event)?;
        Ok(self.mapper.handle_event(&event))
    }

    #[wasm_bindgen(js_name = "fieldDropped")]
    pub fn field_dropped(&self, detail: JsValue) -> Result<bool, JsValue> {
        let detail: FieldDropped = from_js(detail)?;
        Ok(self.mapper.drop_field(&detail))
    }

    #[wasm_bindgen(js_name = "overlayMoved")]
    pub fn overlay_moved(&self, detail: JsValue) -> Result<bool, JsValue> {
        let detail: OverlayMoved = from_js(detail)?;
        Ok(self.mapper.move_overlay(&detail))
    }

    /// `movement` is `{dy, dx, jumpNext}`, `{follow: {field, index}}` or `{script}`.
    #[wasm_bindgen(js_name = "configureMovement")]
    pub fn configure_movement(
        &self,
        field: &str,
        index: usize,
        movement: JsValue,
    ) -> Result<bool, JsValue> {
        let movement: Movement = from_js(movement)?;
        Ok(self.mapper.configure_movement(field, index, movement))
    }

    #[wasm_bindgen(js_name = "removeAddress")]
    pub fn remove_address(&self, field: &str, index: usize) -> bool {
        self.mapper.remove_address(field, index)
    }

    #[wasm_bindgen(js_name = "autoDetect")]
    pub fn auto_detect(&self) -> bool {
        self.mapper.auto_detect()
    }

    #[wasm_bindgen(js_name = "saveTemplate")]
    pub fn save_template(&self) -> Result<String, JsValue> {
        Ok(self.mapper.save_template()?)
    }

    /// Returns the warnings for template cells that could not be placed.
    #[wasm_bindgen(js_name = "loadTemplate")]
    pub fn load_template(&self, text: &str) -> Result<Vec<String>, JsValue> {
        Ok(self.mapper.load_template(text)?.warnings())
    }

    // ========================================================================
    // Export
    // ========================================================================

    #[wasm_bindgen(js_name = "buildJson")]
    pub fn build_json(&self) -> Result<JsValue, JsValue> {
        Ok(to_js(&self.mapper.build_json()?)?)
    }

    #[wasm_bindgen(js_name = "buildPreviewJson")]
    pub fn build_preview_json(&self) -> Result<JsValue, JsValue> {
        Ok(to_js(&self.mapper.build_preview_json()?)?)
    }

    #[wasm_bindgen(js_name = "missingRequiredFields")]
    pub fn missing_required_fields(&self) -> Result<Vec<String>, JsValue> {
        Ok(self.mapper.missing_required_fields()?)
    }
}
