// Event status lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a stored event.
///
/// The machine only moves forward: `pending` can become `acknowledged` or
/// `deleted`, `acknowledged` can become `deleted`, and nothing leaves
/// `deleted`. Deleted events are retained until the cleanup sweep removes
/// them physically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Acknowledged,
    Deleted,
}

/// A status string that does not name a known lifecycle state.
#[derive(Debug, Error)]
#[error("unknown event status: {0}")]
pub struct UnknownStatus(String);

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Acknowledged => "acknowledged",
            EventStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "acknowledged" => Ok(EventStatus::Acknowledged),
            "deleted" => Ok(EventStatus::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
