//! Top-down payload handed from a node to its children.

use crate::exception::FlowException;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased payload carried by [`Metadata`].
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Per-branch payload plus the errors and warnings an ancestor wants its
/// children to see.
///
/// Metadata only ever flows downwards: each node builds the metadata for
/// its children and nothing is merged back.
///
/// # Examples
///
/// ```
/// use kumiki_core::{FlowException, Metadata};
///
/// let metadata = Metadata::new()
///     .with_payload(7u32)
///     .carrying(vec![FlowException::technical("db down")], Vec::new());
///
/// assert_eq!(metadata.payload::<u32>(), Some(&7));
/// assert_eq!(metadata.errors().len(), 1);
/// assert!(metadata.warnings().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Metadata {
    payload: Option<Payload>,
    errors: Vec<FlowException>,
    warnings: Vec<FlowException>,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("has_payload", &self.payload.is_some())
            .field("errors", &self.errors.len())
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

impl Metadata {
    /// Creates metadata with no payload and nothing carried.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the payload.
    pub fn with_payload<T: Any + Send + Sync>(self, payload: T) -> Self {
        self.with_shared_payload(Arc::new(payload))
    }

    /// Replaces the payload with an already shared value.
    pub fn with_shared_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Replaces the carried errors and warnings, keeping the payload.
    pub fn carrying(mut self, errors: Vec<FlowException>, warnings: Vec<FlowException>) -> Self {
        self.errors = errors;
        self.warnings = warnings;
        self
    }

    /// Returns the payload if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Errors carried from an ancestor.
    pub fn errors(&self) -> &[FlowException] {
        &self.errors
    }

    /// Warnings carried from an ancestor.
    pub fn warnings(&self) -> &[FlowException] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
