//! UI event payloads.
//!
//! Pointer, touch and keyboard drag sensors all emit one of these two events;
//! [`crate::mapper::Mapper::handle_event`] routes both through the same
//! mutation logic regardless of where they came from.

use serde::{Deserialize, Serialize};

pub const FIELD_DROPPED: &str = "FIELD_DROPPED";
pub const OVERLAY_MOVED: &str = "OVERLAY_MOVED";

/// A schema field was dropped onto a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDropped {
    pub field: String,
    pub row: u32,
    pub col: u32,
    /// Defaults to the active sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// An existing overlay (`mapping[field][index]`) was dragged to a new cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayMoved {
    pub field: String,
    pub index: usize,
    pub row: u32,
    pub col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// `{ "type": "FIELD_DROPPED" | "OVERLAY_MOVED", "detail": {...} }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingEvent {
    FieldDropped(FieldDropped),
    OverlayMoved(OverlayMoved),
}

impl MappingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MappingEvent::FieldDropped(_) => FIELD_DROPPED,
            MappingEvent::OverlayMoved(_) => OVERLAY_MOVED,
        }
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
    use serde_json::json;

    #[test]
    fn test_event_envelope() {
        let event: MappingEvent = serde_json::from_value(json!({
            "type": "OVERLAY_MOVED",
            "detail": {"field": "notes", "index": 1, "row": 4, "col": 2}
        }))
        .unwrap();
        assert_eq!(event.name(), OVERLAY_MOVED);
        let MappingEvent::OverlayMoved(moved) = event else {
            panic!("wrong variant");
        };
        assert_eq!(moved.sheet, None);
        assert_eq!((moved.index, moved.row, moved.col), (1, 4, 2));
    }

    #[test]
    fn test_drop_with_sheet() {
        let event: MappingEvent = serde_json::from_value(json!({
            "type": "FIELD_DROPPED",
            "detail": {"field": "title", "row": 0, "col": 0, "sheet": "Other"}
        }))
        .unwrap();
        assert_eq!(
            event,
            MappingEvent::FieldDropped(FieldDropped {
                field: "title".into(),
                row: 0,
                col: 0,
                sheet: Some("Other".into()),
            })
        );
    }
}
