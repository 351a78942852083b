//! Settled state of a flow node.

use serde::Serialize;
use std::fmt;

/// Status of a flow node.
///
/// Every node starts as `Ignored` and settles to one of the other three
/// once it has executed. Nodes that were never chosen stay `Ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    #[default]
    Ignored,
    Success,
    Warning,
    Error,
}

impl FlowStatus {
    /// `Success` and `Warning` both count as succeeded.
    pub fn is_successful(&self) -> bool {
        matches!(self, FlowStatus::Success | FlowStatus::Warning)
    }

    pub fn is_error(&self) -> bool {
        *self == FlowStatus::Error
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStatus::Ignored => write!(f, "IGNORED"),
            FlowStatus::Success => write!(f, "SUCCESS"),
            FlowStatus::Warning => write!(f, "WARNING"),
            FlowStatus::Error => write!(f, "ERROR"),
        }
    }
}
