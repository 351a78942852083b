//! Status derivation shared by every node type.

use crate::record::ExecutionRecord;
use kumiki_core::{FlowException, FlowStatus};

/// How a node decides whether it succeeded, given its own errors and its
/// already settled children.
///
/// The final status is `Error` when the chosen combinator fails, otherwise
/// `Warning` when [`any_warning`] holds, otherwise `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// No own errors and every child succeeded.
    AllSucceeded,
    /// No own errors and at least one child succeeded.
    AnySucceeded,
}

impl StatusPolicy {
    pub fn resolve(
        self,
        errors: &[FlowException],
        warnings: &[FlowException],
        children: &[ExecutionRecord],
    ) -> FlowStatus {
        let succeeded = match self {
            StatusPolicy::AllSucceeded => all_succeeded(errors, children),
            StatusPolicy::AnySucceeded => any_succeeded(errors, children),
        };
        if !succeeded {
            FlowStatus::Error
        } else if any_warning(warnings, children) {
            FlowStatus::Warning
        } else {
            FlowStatus::Success
        }
    }
}

/// Own error list empty and every child is `Success` or `Warning`.
pub fn all_succeeded(errors: &[FlowException], children: &[ExecutionRecord]) -> bool {
    errors.is_empty() && children.iter().all(|child| child.status().is_successful())
}

/// Own error list empty and at least one child is `Success` or `Warning`.
///
/// A leaf has no children to disagree with, so it succeeds on its own errors alone.
pub fn any_succeeded(errors: &[FlowException], children: &[ExecutionRecord]) -> bool {
    errors.is_empty()
        && (children.is_empty() || children.iter().any(|child| child.status().is_successful()))
}

/// Own warning list non-empty or at least one child is `Warning`.
pub fn any_warning(warnings: &[FlowException], children: &[ExecutionRecord]) -> bool {
    !warnings.is_empty()
        || children
            .iter()
            .any(|child| child.status() == FlowStatus::Warning)
}
