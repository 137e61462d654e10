//! Soft-delete marker policy.
//!
//! # Responsibility
//! - Encode "deleted" and "live" marker values for both marker schemes.
//! - Provide the liveness predicate applied to persisted marker values.
//!
//! # Invariants
//! - Exactly one scheme per record type, fixed at registration time.
//! - This module is pure: no clock access (callers pass the timestamp in)
//!   and no I/O.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Marker encoding scheme for one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerScheme {
    /// Nullable epoch-ms column; non-null means deleted.
    Timestamp,
    /// Integer boolean column; `1` means deleted.
    Flag,
}

impl MarkerScheme {
    /// Stable string id used in configuration declarations.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => MARKER_SCHEME_TIMESTAMP,
            Self::Flag => MARKER_SCHEME_FLAG,
        }
    }
}

/// Declaration string value for the timestamp scheme.
pub const MARKER_SCHEME_TIMESTAMP: &str = "timestamp";
/// Declaration string value for the flag scheme.
pub const MARKER_SCHEME_FLAG: &str = "flag";

/// Parses one marker scheme from a configuration declaration string.
///
/// Misconfiguration must surface at record-type setup, not at call time,
/// so this rejects anything outside the two supported declarations.
pub fn parse_marker_scheme(value: &str) -> Result<MarkerScheme, MarkerSchemeError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(MarkerSchemeError::EmptyScheme);
    }

    match normalized {
        MARKER_SCHEME_TIMESTAMP => Ok(MarkerScheme::Timestamp),
        MARKER_SCHEME_FLAG => Ok(MarkerScheme::Flag),
        other => Err(MarkerSchemeError::UnsupportedScheme(other.to_string())),
    }
}

/// Marker scheme parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerSchemeError {
    EmptyScheme,
    UnsupportedScheme(String),
}

impl Display for MarkerSchemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyScheme => write!(f, "marker scheme value must not be empty"),
            Self::UnsupportedScheme(value) => {
                write!(f, "marker scheme is unsupported: {value}")
            }
        }
    }
}

impl Error for MarkerSchemeError {}

/// Value of a marker column, independent of storage representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerValue {
    /// Absent timestamp; the live value of the timestamp scheme.
    Null,
    /// Deletion time in epoch milliseconds.
    Timestamp(i64),
    /// Boolean tombstone state.
    Flag(bool),
}

/// Marker encoding/decoding policy for one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPolicy {
    scheme: MarkerScheme,
}

impl MarkerPolicy {
    pub fn new(scheme: MarkerScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(self) -> MarkerScheme {
        self.scheme
    }

    /// Marker value that represents "deleted" under this scheme.
    pub fn deleted_value(self, now_epoch_ms: i64) -> MarkerValue {
        match self.scheme {
            MarkerScheme::Timestamp => MarkerValue::Timestamp(now_epoch_ms),
            MarkerScheme::Flag => MarkerValue::Flag(true),
        }
    }

    /// Marker value that represents "live" under this scheme.
    pub fn live_value(self) -> MarkerValue {
        match self.scheme {
            MarkerScheme::Timestamp => MarkerValue::Null,
            MarkerScheme::Flag => MarkerValue::Flag(false),
        }
    }

    /// Liveness predicate over a persisted marker value.
    ///
    /// Marker values reach callers through the store, which rejects column
    /// shapes that disagree with the registered scheme, so a mismatched
    /// value cannot be observed here; it reads as live.
    pub fn is_deleted(self, value: &MarkerValue) -> bool {
        match (self.scheme, value) {
            (MarkerScheme::Timestamp, MarkerValue::Timestamp(_)) => true,
            (MarkerScheme::Flag, MarkerValue::Flag(deleted)) => *deleted,
            _ => false,
        }
    }
}
