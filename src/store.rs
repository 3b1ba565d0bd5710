//! Versioned application state with change notification.
//!
//! [`Store`] is an explicit context object: the application root owns it (or
//! shares it through an `Rc`), and every component reads and writes state
//! through it. There is no process-wide singleton, so tests can create as many
//! isolated stores as they like.
//!
//! State is held as an `Rc<AppState>`. [`Store::get_state`] hands out a clone
//! of that `Rc`; each transition builds a fresh `AppState` (sharing the large
//! slices such as the workbook and the records), so a snapshot obtained earlier
//! never changes underneath its holder.
//!
//! Listeners are called in registration order with `(new, prev)`. `prev` is
//! `None` only for the synchronous call made at subscribe time. A failing
//! listener is logged and does not stop the others. Listeners run after the
//! store has released its internal borrows, so they may call back into the
//! store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use crate::config::ConfirmNextMode;
use crate::error::{Result, XlmapError};
use crate::schema::resolve_properties;
use crate::types::{Mapping, WorkbookState};

/// Result type returned by store listeners.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error>>;

type Listener = Rc<dyn Fn(&AppState, Option<&AppState>) -> ListenerResult>;

/// The complete application state.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub workbook: Option<Rc<WorkbookState>>,
    /// Parsed JSON Schema, kept verbatim.
    pub schema: Option<Rc<Value>>,
    /// Working record: field → addresses.
    pub mapping: Rc<Mapping>,
    /// Field focused by the per-field workflow.
    pub current_field_index: usize,
    /// User-facing warnings (e.g. template cells that could not be placed).
    pub errors: Vec<String>,
    /// Confirmed snapshots, oldest first.
    pub records: Rc<Vec<Mapping>>,
    pub confirm_next_mode: ConfirmNextMode,
}

/// Keys accepted by [`Store::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Workbook,
    Schema,
    Mapping,
    CurrentFieldIndex,
    Errors,
    Records,
    ConfirmNextMode,
}

impl StateKey {
    pub const ALL: [StateKey; 7] = [
        StateKey::Workbook,
        StateKey::Schema,
        StateKey::Mapping,
        StateKey::CurrentFieldIndex,
        StateKey::Errors,
        StateKey::Records,
        StateKey::ConfirmNextMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::Workbook => "workbook",
            StateKey::Schema => "schema",
            StateKey::Mapping => "mapping",
            StateKey::CurrentFieldIndex => "currentFieldIndex",
            StateKey::Errors => "errors",
            StateKey::Records => "records",
            StateKey::ConfirmNextMode => "confirmNextMode",
        }
    }
}

impl FromStr for StateKey {
    type Err = XlmapError;

    fn from_str(s: &str) -> Result<Self> {
        StateKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| XlmapError::UnknownKey(s.to_string()))
    }
}

/// A partial update merged into the state by [`Store::set_state`].
///
/// Unset slots keep their current value. One patch produces exactly one
/// notification, so multi-slot transitions are never observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    workbook: Option<Option<Rc<WorkbookState>>>,
    schema: Option<Option<Rc<Value>>>,
    mapping: Option<Rc<Mapping>>,
    current_field_index: Option<usize>,
    errors: Option<Vec<String>>,
    records: Option<Rc<Vec<Mapping>>>,
    confirm_next_mode: Option<ConfirmNextMode>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn workbook(mut self, workbook: Option<WorkbookState>) -> Self {
        self.workbook = Some(workbook.map(Rc::new));
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: Option<Value>) -> Self {
        self.schema = Some(schema.map(Rc::new));
        self
    }

    #[must_use]
    pub fn mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(Rc::new(mapping));
        self
    }

    #[must_use]
    pub fn current_field_index(mut self, index: usize) -> Self {
        self.current_field_index = Some(index);
        self
    }

    #[must_use]
    pub fn errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn records(mut self, records: Vec<Mapping>) -> Self {
        self.records = Some(Rc::new(records));
        self
    }

    #[must_use]
    pub fn confirm_next_mode(mut self, mode: ConfirmNextMode) -> Self {
        self.confirm_next_mode = Some(mode);
        self
    }

    /// Decode a JSON value for one key.
    pub fn from_json(key: StateKey, value: Value) -> Result<Self> {
        let patch = Self::new();
        Ok(match key {
            StateKey::Workbook => {
                let workbook: Option<WorkbookState> = decode(key, value)?;
                if let Some(wb) = &workbook {
                    wb.validate()?;
                }
                patch.workbook(workbook)
            }
            StateKey::Schema => patch.schema((!value.is_null()).then_some(value)),
            StateKey::Mapping => {
                let mapping: Option<Mapping> = decode(key, value)?;
                patch.mapping(mapping.unwrap_or_default())
            }
            StateKey::CurrentFieldIndex => patch.current_field_index(decode(key, value)?),
            StateKey::Errors => patch.errors(decode(key, value)?),
            StateKey::Records => patch.records(decode(key, value)?),
            StateKey::ConfirmNextMode => patch.confirm_next_mode(decode(key, value)?),
        })
    }

    fn apply(self, state: &mut AppState) {
        let reclamp = self.schema.is_some() || self.current_field_index.is_some();
        if let Some(workbook) = self.workbook {
            state.workbook = workbook;
        }
        if let Some(schema) = self.schema {
            state.schema = schema;
        }
        if let Some(mapping) = self.mapping {
            state.mapping = mapping;
        }
        if let Some(index) = self.current_field_index {
            state.current_field_index = index;
        }
        if let Some(errors) = self.errors {
            state.errors = errors;
        }
        if let Some(records) = self.records {
            state.records = records;
        }
        if let Some(mode) = self.confirm_next_mode {
            state.confirm_next_mode = mode;
        }
        if reclamp {
            clamp_field_index(state);
        }
    }
}

/// Keep `current_field_index` inside `[0, field_count - 1]`; 0 without a
/// schema or when the schema has no properties.
fn clamp_field_index(state: &mut AppState) {
    let count = state
        .schema
        .as_deref()
        .and_then(resolve_properties)
        .map_or(0, |properties| properties.len());
    let clamped = state.current_field_index.min(count.saturating_sub(1));
    if clamped != state.current_field_index {
        tracing::debug!(
            requested = state.current_field_index,
            clamped,
            "current field index clamped to schema"
        );
        state.current_field_index = clamped;
    }
}

fn decode<T: DeserializeOwned>(key: StateKey, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| XlmapError::InvalidValue {
        key: key.as_str(),
        source,
    })
}

struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Handle returned by [`Store::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.borrow_mut();
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        registry.listeners.len() != before
    }
}

pub struct Store {
    state: RefCell<Rc<AppState>>,
    version: Cell<u64>,
    registry: Rc<RefCell<Registry>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version.get())
            .field("listener_count", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(mut state: AppState) -> Self {
        clamp_field_index(&mut state);
        Self {
            state: RefCell::new(Rc::new(state)),
            version: Cell::new(0),
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Current state snapshot. Later transitions never mutate it.
    pub fn get_state(&self) -> Rc<AppState> {
        Rc::clone(&self.state.borrow())
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Merge `patch` into the state and notify listeners once.
    pub fn set_state(&self, patch: StatePatch) {
        let (next, prev) = {
            let mut slot = self.state.borrow_mut();
            let prev = Rc::clone(&slot);
            let mut next = AppState::clone(&prev);
            patch.apply(&mut next);
            let next = Rc::new(next);
            *slot = Rc::clone(&next);
            (next, prev)
        };
        self.version.set(self.version.get() + 1);
        self.notify(&next, Some(&prev));
    }

    /// Set one slot from JSON, failing on unknown keys or mistyped values.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let key: StateKey = key.parse()?;
        self.set_state(StatePatch::from_json(key, value)?);
        Ok(())
    }

    /// Register `listener`; it is immediately called once with `(state, None)`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppState, Option<&AppState>) -> ListenerResult + 'static,
    {
        let listener: Listener = Rc::new(listener);
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Rc::clone(&listener)));
            id
        };
        let current = self.get_state();
        report(id, listener(&current, None));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    fn notify(&self, next: &AppState, prev: Option<&AppState>) {
        // Collect first so listeners may subscribe/unsubscribe re-entrantly.
        let listeners: Vec<(u64, Listener)> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|(id, l)| (*id, Rc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            report(id, listener(next, prev));
        }
    }
}

fn report(id: u64, result: ListenerResult) {
    if let Err(err) = result {
        tracing::error!(listener = id, error = %err, "store listener failed");
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
    use crate::types::CellAddress;
    use serde_json::json;

    #[test]
    fn test_unknown_key_is_rejected() {
        let store = Store::new();
        let err = store.set("bogus", json!(1)).unwrap_err();
        assert!(matches!(err, XlmapError::UnknownKey(k) if k == "bogus"));
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_mistyped_value_is_rejected() {
        let store = Store::new();
        let err = store.set("currentFieldIndex", json!("two")).unwrap_err();
        assert!(matches!(err, XlmapError::InvalidValue { key: "currentFieldIndex", .. }));
    }

    #[test]
    fn test_workbook_active_sheet_must_exist() {
        let store = Store::new();
        let wb = json!({"sheets": ["A"], "activeSheet": "B", "data": {"A": []}});
        assert!(matches!(
            store.set("workbook", wb),
            Err(XlmapError::InvalidWorkbook(_))
        ));
    }

    fn three_field_store() -> Store {
        let store = Store::new();
        store
            .set("schema", json!({"properties": {"a": {}, "b": {}, "c": {}}}))
            .unwrap();
        store
    }

    #[test]
    fn test_subscribe_calls_immediately_with_no_prev() {
        let store = three_field_store();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        let _sub = store.subscribe(move |state, prev| {
            seen.borrow_mut()
                .push((state.current_field_index, prev.map(|p| p.current_field_index)));
            Ok(())
        });
        store.set("currentFieldIndex", json!(2)).unwrap();
        assert_eq!(*calls.borrow(), vec![(0, None), (2, Some(0))]);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let store = Store::new();
        let hits = Rc::new(Cell::new(0));
        let _bad = store.subscribe(|_, prev| {
            if prev.is_some() {
                return Err("boom".into());
            }
            Ok(())
        });
        let counter = Rc::clone(&hits);
        let _good = store.subscribe(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        store.set("errors", json!(["x"])).unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = Store::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let sub = store.subscribe(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        assert!(sub.unsubscribe());
        store.set("errors", json!([])).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_snapshots_are_copy_on_read() {
        let store = Store::new();
        let mut mapping = Mapping::new();
        mapping.insert("a".into(), vec![CellAddress::new("S", 0, 0)]);
        store.set_state(StatePatch::new().mapping(mapping));

        let before = store.get_state();
        let again = store.get_state();
        assert_eq!(before, again);

        store.set_state(StatePatch::new().mapping(Mapping::new()));
        assert_eq!(before.mapping.len(), 1);
        assert!(store.get_state().mapping.is_empty());
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_field_index_is_clamped_to_schema() {
        let store = three_field_store();
        store.set("currentFieldIndex", json!(99)).unwrap();
        assert_eq!(store.get_state().current_field_index, 2);
        store.set("schema", json!({"properties": {"only": {}}})).unwrap();
        assert_eq!(store.get_state().current_field_index, 0);
        store.set("schema", json!(null)).unwrap();
        store.set("currentFieldIndex", json!(1)).unwrap();
        assert_eq!(store.get_state().current_field_index, 0);
    }

    #[test]
    fn test_listener_may_write_back_into_store() {
        let store = Rc::new(three_field_store());
        let handle = Rc::downgrade(&store);
        let _sub = store.subscribe(move |state, prev| {
            if prev.is_some() && state.current_field_index == 1 {
                if let Some(store) = handle.upgrade() {
                    store.set_state(StatePatch::new().current_field_index(2));
                }
            }
            Ok(())
        });
        store.set_state(StatePatch::new().current_field_index(1));
        assert_eq!(store.get_state().current_field_index, 2);
    }

    #[test]
    fn test_state_serializes_with_camel_case_keys() {
        let store = Store::new();
        let value = serde_json::to_value(&*store.get_state()).unwrap();
        for key in StateKey::ALL {
            assert!(value.get(key.as_str()).is_some(), "missing {}", key.as_str());
        }
    }
}
