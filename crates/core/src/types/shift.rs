//! Scheduled staff shifts edited in bulk by the shift planner.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::id::{EntityId, RemoteEntity, TempId};
use super::status::ShiftType;

/// A scheduled shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: EntityId,
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub role: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default)]
    pub staff_name: Option<String>,
}

impl RemoteEntity for Shift {
    fn entity_id(&self) -> EntityId {
        self.id
    }
}

/// Natural key of a shift: the fields that make two records "the same slot".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftKey {
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub role: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Shift {
    /// Natural key (date, shift type, role, time range).
    #[must_use]
    pub fn natural_key(&self) -> ShiftKey {
        ShiftKey {
            date: self.date,
            shift_type: self.shift_type,
            role: self.role.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// A shift the user is planning; gets a temporary id when added locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDraft {
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub role: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default)]
    pub staff_name: Option<String>,
}

impl ShiftDraft {
    /// Attach a temporary id.
    #[must_use]
    pub fn into_shift(self, id: TempId) -> Shift {
        Shift {
            id: EntityId::Temporary(id),
            date: self.date,
            shift_type: self.shift_type,
            role: self.role,
            start: self.start,
            end: self.end,
            staff_name: self.staff_name,
        }
    }
}
