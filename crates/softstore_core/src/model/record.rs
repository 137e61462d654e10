//! Record handles and scoped-select read models.

use crate::model::marker::MarkerValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every record the engine touches.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// Engine-side handle to one application record.
///
/// The application owns the record's fields; the engine only needs its type
/// name and identity. A handle without an identity refers to a record that
/// was never persisted, and lifecycle operations on it fail accordingly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    type_name: String,
    id: Option<RecordId>,
}

impl RecordRef {
    /// Handle to a persisted record with a known identity.
    pub fn persisted(type_name: impl Into<String>, id: RecordId) -> Self {
        Self {
            type_name: type_name.into(),
            id: Some(id),
        }
    }

    /// Handle to a record that has never been saved.
    pub fn unsaved(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }
}

/// Read model returned by scoped selects.
///
/// Carries the identity plus the marker value when the queried type is
/// soft-delete-capable; `marker` is `None` for types without a marker
/// column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: RecordId,
    pub marker: Option<MarkerValue>,
}
