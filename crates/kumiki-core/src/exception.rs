//! Flow exceptions recorded on nodes during execution.

use crate::step::FlowName;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type returned by user-supplied callbacks.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Classification of a [`FlowException`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExceptionKind {
    /// Infrastructure or unexpected failure.
    Technical,
    /// Business-rule failure.
    Functional,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::Technical => write!(f, "Technical"),
            ExceptionKind::Functional => write!(f, "Functional"),
        }
    }
}

/// An error or warning recorded on a flow node.
///
/// Exceptions are never thrown through the tree: they are attached to the
/// node where they occurred and read back from the report.
///
/// # Examples
///
/// ```
/// use kumiki_core::{ExceptionKind, FlowException};
///
/// let exception = FlowException::functional("credit limit exceeded").originating_in("charge");
/// assert_eq!(exception.kind(), ExceptionKind::Functional);
/// assert_eq!(exception.flow().map(|name| name.as_str()), Some("charge"));
/// assert_eq!(exception.to_string(), "Functional failure: credit limit exceeded");
/// ```
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind} failure: {message}")]
pub struct FlowException {
    kind: ExceptionKind,
    message: String,
    flow: Option<FlowName>,
    #[serde(skip)]
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl FlowException {
    /// Creates an exception of the given kind.
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            flow: None,
            source: None,
        }
    }

    /// Creates a technical exception.
    pub fn technical(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Technical, message)
    }

    /// Creates a functional exception.
    pub fn functional(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Functional, message)
    }

    /// Converts an error returned by a user callback.
    ///
    /// A boxed `FlowException` keeps its kind; anything else becomes a
    /// technical exception with the original error as its source.
    pub fn from_raw(error: BoxError) -> Self {
        match error.downcast::<FlowException>() {
            Ok(exception) => *exception,
            Err(other) => {
                let message = other.to_string();
                Self::technical(message).with_source(Arc::from(other))
            }
        }
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: Arc<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    /// Records the node this exception belongs to, unless one is already set.
    pub fn originating_in(mut self, flow: impl Into<FlowName>) -> Self {
        if self.flow.is_none() {
            self.flow = Some(flow.into());
        }
        self
    }

    /// Returns the exception kind.
    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the originating flow, if known.
    pub fn flow(&self) -> Option<&FlowName> {
        self.flow.as_ref()
    }

    pub fn is_technical(&self) -> bool {
        self.kind == ExceptionKind::Technical
    }

    pub fn is_functional(&self) -> bool {
        self.kind == ExceptionKind::Functional
    }
}

/// Which exception kinds a recoverable or retryable flow may absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RecoverableSelector {
    Technical,
    Functional,
    #[default]
    All,
}

impl RecoverableSelector {
    /// Returns `true` if the exception is eligible under this selector.
    pub fn matches(&self, exception: &FlowException) -> bool {
        match self {
            RecoverableSelector::Technical => exception.is_technical(),
            RecoverableSelector::Functional => exception.is_functional(),
            RecoverableSelector::All => true,
        }
    }

    /// Returns `true` only if there is at least one exception and every one
    /// of them matches. A partial match never qualifies.
    pub fn matches_all<'a, I>(&self, exceptions: I) -> bool
    where
        I: IntoIterator<Item = &'a FlowException>,
    {
        let mut seen = false;
        for exception in exceptions {
            if !self.matches(exception) {
                return false;
            }
            seen = true;
        }
        seen
    }
}

impl fmt::Display for RecoverableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverableSelector::Technical => write!(f, "technical"),
            RecoverableSelector::Functional => write!(f, "functional"),
            RecoverableSelector::All => write!(f, "all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct IoLikeError;

    impl fmt::Display for IoLikeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl StdError for IoLikeError {}

    #[test]
    fn test_from_raw_wraps_foreign_errors_as_technical() {
        let exception = FlowException::from_raw(Box::new(IoLikeError));
        assert!(exception.is_technical());
        assert_eq!(exception.message(), "connection reset");
        assert!(exception.source().is_some());
    }

    #[test]
    fn test_from_raw_keeps_flow_exceptions() {
        let raised: BoxError = Box::new(FlowException::functional("out of stock"));
        let exception = FlowException::from_raw(raised);
        assert!(exception.is_functional());
        assert_eq!(exception.message(), "out of stock");
    }

    #[test]
    fn test_origin_is_set_once() {
        let exception = FlowException::technical("boom")
            .originating_in("inner")
            .originating_in("outer");
        assert_eq!(exception.flow().map(|f| f.as_str()), Some("inner"));
    }

    #[test]
    fn test_selector_requires_every_exception_to_match() {
        let technical = FlowException::technical("t");
        let functional = FlowException::functional("f");

        assert!(RecoverableSelector::Technical.matches_all([&technical]));
        assert!(!RecoverableSelector::Technical.matches_all([&technical, &functional]));
        assert!(RecoverableSelector::All.matches_all([&technical, &functional]));
        assert!(RecoverableSelector::Functional.matches_all([&functional]));
    }

    #[test]
    fn test_selector_never_matches_nothing() {
        let none: Vec<&FlowException> = Vec::new();
        assert!(!RecoverableSelector::All.matches_all(none));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ExceptionKind::Technical.to_string(), "Technical");
        assert_eq!(ExceptionKind::Functional.to_string(), "Functional");
    }
}
