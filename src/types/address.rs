use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::XlmapError;

/// Field name → ordered cell addresses.
///
/// Order is significant for array fields (append order is output order);
/// scalar fields hold at most one entry.
pub type Mapping = IndexMap<String, Vec<CellAddress>>;

/// The `(field, index)` of the entry a follower mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowTarget {
    pub field: String,
    pub index: usize,
}

/// How an address advances when a record is confirmed.
///
/// Exactly one strategy is active per address. Serialized as the movement
/// keys of a flat address (`{dy, dx, jumpNext}`, `{follow}` or `{script}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMovement", into = "RawMovement")]
pub enum Movement {
    /// Step by `(dy, dx)`; with `jump_next` keep stepping until a non-empty,
    /// non-shadow cell is found.
    Offset { dy: i32, dx: i32, jump_next: bool },
    /// Mirror the delta realized by another entry.
    Follow(FollowTarget),
    /// User script returning a row delta or an absolute `{row, col}`.
    Script(String),
}

impl Movement {
    /// Movement given to addresses created by a drop.
    pub const fn drop_default() -> Self {
        Self::Offset {
            dy: 1,
            dx: 0,
            jump_next: true,
        }
    }

    pub fn follow(field: impl Into<String>, index: usize) -> Self {
        Self::Follow(FollowTarget {
            field: field.into(),
            index,
        })
    }

    pub fn follow_target(&self) -> Option<&FollowTarget> {
        match self {
            Self::Follow(target) => Some(target),
            _ => None,
        }
    }
}

impl Default for Movement {
    /// Addresses supplied without any movement keys shift down one row.
    fn default() -> Self {
        Self::Offset {
            dy: 1,
            dx: 0,
            jump_next: false,
        }
    }
}

/// A mapped cell plus its movement config.
///
/// On the wire the movement keys are flattened into the address object:
/// `{sheet, row, col, dy, dx, jumpNext}`, `{sheet, row, col, follow}` or
/// `{sheet, row, col, script}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCellAddress", into = "RawCellAddress")]
pub struct CellAddress {
    pub sheet: String,
    pub row: u32,
    pub col: u32,
    pub movement: Movement,
}

impl CellAddress {
    pub fn new(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
            movement: Movement::default(),
        }
    }

    #[must_use]
    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = movement;
        self
    }

    /// Same physical cell, ignoring movement config.
    pub fn same_cell(&self, other: &Self) -> bool {
        self.row == other.row && self.col == other.col && self.sheet == other.sheet
    }

    /// Copy of this address relocated to `(sheet, row, col)`, keeping movement.
    #[must_use]
    pub fn relocated(&self, sheet: &str, row: u32, col: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            row,
            col,
            movement: self.movement.clone(),
        }
    }
}

/// Wire shape of a movement config: the optional keys of a flat address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMovement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dy: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dx: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jump_next: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    follow: Option<FollowTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script: Option<String>,
}

impl TryFrom<RawMovement> for Movement {
    type Error = XlmapError;

    fn try_from(raw: RawMovement) -> Result<Self, Self::Error> {
        let has_offset = raw.dy.is_some() || raw.dx.is_some() || raw.jump_next.is_some();
        let movement = match (raw.follow, raw.script) {
            (Some(_), Some(_)) => {
                return Err(XlmapError::InvalidMovement(
                    "both follow and script are set".into(),
                ))
            }
            (Some(_), None) | (None, Some(_)) if has_offset => {
                return Err(XlmapError::InvalidMovement(
                    "offset keys cannot be combined with follow or script".into(),
                ))
            }
            (Some(target), None) => Movement::Follow(target),
            (None, Some(script)) => Movement::Script(script),
            (None, None) if has_offset => Movement::Offset {
                dy: raw.dy.unwrap_or(1),
                dx: raw.dx.unwrap_or(0),
                jump_next: raw.jump_next.unwrap_or(false),
            },
            (None, None) => Movement::default(),
        };
        Ok(movement)
    }
}

impl From<Movement> for RawMovement {
    fn from(movement: Movement) -> Self {
        match movement {
            Movement::Offset { dy, dx, jump_next } => Self {
                dy: Some(dy),
                dx: Some(dx),
                jump_next: Some(jump_next),
                ..Self::default()
            },
            Movement::Follow(target) => Self {
                follow: Some(target),
                ..Self::default()
            },
            Movement::Script(script) => Self {
                script: Some(script),
                ..Self::default()
            },
        }
    }
}

/// Flat wire shape of [`CellAddress`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCellAddress {
    sheet: String,
    row: u32,
    col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dy: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dx: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jump_next: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    follow: Option<FollowTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script: Option<String>,
}

impl TryFrom<RawCellAddress> for CellAddress {
    type Error = XlmapError;

    fn try_from(raw: RawCellAddress) -> Result<Self, Self::Error> {
        let movement = Movement::try_from(RawMovement {
            dy: raw.dy,
            dx: raw.dx,
            jump_next: raw.jump_next,
            follow: raw.follow,
            script: raw.script,
        })?;
        Ok(Self {
            sheet: raw.sheet,
            row: raw.row,
            col: raw.col,
            movement,
        })
    }
}

impl From<CellAddress> for RawCellAddress {
    fn from(addr: CellAddress) -> Self {
        let movement = RawMovement::from(addr.movement);
        Self {
            sheet: addr.sheet,
            row: addr.row,
            col: addr.col,
            dy: movement.dy,
            dx: movement.dx,
            jump_next: movement.jump_next,
            follow: movement.follow,
            script: movement.script,
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
    fn test_bare_address_defaults_to_row_step() {
        let addr: CellAddress =
            serde_json::from_value(json!({"sheet": "S", "row": 1, "col": 2})).unwrap();
        assert_eq!(addr.movement, Movement::default());
    }

    #[test]
    fn test_partial_offset_keys_are_normalized() {
        let addr: CellAddress =
            serde_json::from_value(json!({"sheet": "S", "row": 0, "col": 0, "jumpNext": true}))
                .unwrap();
        assert_eq!(addr.movement, Movement::drop_default());
    }

    #[test]
    fn test_follow_and_script_parse() {
        let addr: CellAddress = serde_json::from_value(
            json!({"sheet": "S", "row": 0, "col": 1, "follow": {"field": "a", "index": 0}}),
        )
        .unwrap();
        assert_eq!(addr.movement, Movement::follow("a", 0));

        let addr: CellAddress =
            serde_json::from_value(json!({"sheet": "S", "row": 0, "col": 1, "script": "2"}))
                .unwrap();
        assert_eq!(addr.movement, Movement::Script("2".into()));
    }

    #[test]
    fn test_ambiguous_movement_is_rejected() {
        let both = json!({"sheet": "S", "row": 0, "col": 0, "script": "1", "follow": {"field": "a", "index": 0}});
        assert!(serde_json::from_value::<CellAddress>(both).is_err());

        let mixed = json!({"sheet": "S", "row": 0, "col": 0, "dy": 2, "script": "1"});
        assert!(serde_json::from_value::<CellAddress>(mixed).is_err());
    }

    #[test]
    fn test_movement_alone() {
        let m: Movement = serde_json::from_value(json!({"follow": {"field": "a", "index": 2}})).unwrap();
        assert_eq!(m, Movement::follow("a", 2));
        let m: Movement = serde_json::from_value(json!({})).unwrap();
        assert_eq!(m, Movement::default());
        assert_eq!(
            serde_json::to_value(Movement::Script("row".into())).unwrap(),
            json!({"script": "row"})
        );
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let addr = CellAddress::new("S", 3, 4).with_movement(Movement::drop_default());
        let value = serde_json::to_value(&addr).unwrap();
        assert_eq!(
            value,
            json!({"sheet": "S", "row": 3, "col": 4, "dy": 1, "dx": 0, "jumpNext": true})
        );
    }
}
