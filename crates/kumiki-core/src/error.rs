//! Construction-time errors.

use crate::step::RetryPolicyError;
use thiserror::Error;

/// Errors raised while assembling a flow tree.
///
/// Execution itself never fails with a `FlowError`: runtime failures are
/// recorded as [`FlowException`](crate::FlowException)s on the nodes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    /// A required builder field was not provided.
    #[error("Flow '{flow}' is missing required field '{field}'")]
    MissingField {
        /// Name of the flow being built (may be empty when the name itself is missing).
        flow: String,
        /// The missing field.
        field: &'static str,
    },

    /// Two switch cases share the same key.
    #[error("Switch flow '{flow}' declares case '{key}' more than once")]
    DuplicateCase { flow: String, key: String },

    /// The flow configuration is invalid.
    #[error("Invalid flow configuration: {0}")]
    Configuration(String),

    /// The retry policy is invalid.
    #[error("Invalid retry policy: {0}")]
    RetryPolicy(#[from] RetryPolicyError),
}
