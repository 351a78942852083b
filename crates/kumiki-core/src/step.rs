//! Step contract and related types.

use crate::context::ExecutionContext;
use crate::exception::{BoxError, FlowException};
use crate::metadata::Metadata;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::time::Duration;

/// Type-safe flow name wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FlowName(String);

impl FlowName {
    /// Creates a new FlowName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the flow name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the name is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FlowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FlowName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&FlowName> for FlowName {
    fn from(name: &FlowName) -> Self {
        name.clone()
    }
}

impl AsRef<str> for FlowName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for FlowName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for FlowName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for FlowName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What a step reports back to the engine.
///
/// Every variant except [`StepOutcome::Empty`] hands back the context the
/// rest of the flow should continue with, usually the one it received.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step succeeded.
    Success(ExecutionContext),
    /// The step succeeded but raised warnings.
    SuccessWithWarnings(ExecutionContext, Vec<FlowException>),
    /// The step failed.
    Error(ExecutionContext, Vec<FlowException>),
    /// The step failed and also raised warnings.
    ErrorWithWarnings(ExecutionContext, Vec<FlowException>, Vec<FlowException>),
    /// The step produced no outcome at all.
    Empty,
}

impl StepOutcome {
    pub fn success(ctx: ExecutionContext) -> Self {
        Self::Success(ctx)
    }

    pub fn success_with_warnings(
        ctx: ExecutionContext,
        warnings: impl IntoIterator<Item = FlowException>,
    ) -> Self {
        Self::SuccessWithWarnings(ctx, warnings.into_iter().collect())
    }

    pub fn error(ctx: ExecutionContext, errors: impl IntoIterator<Item = FlowException>) -> Self {
        Self::Error(ctx, errors.into_iter().collect())
    }

    pub fn error_with_warnings(
        ctx: ExecutionContext,
        errors: impl IntoIterator<Item = FlowException>,
        warnings: impl IntoIterator<Item = FlowException>,
    ) -> Self {
        Self::ErrorWithWarnings(
            ctx,
            errors.into_iter().collect(),
            warnings.into_iter().collect(),
        )
    }

    pub fn empty() -> Self {
        Self::Empty
    }

    /// Returns `true` for the two error variants.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(..) | Self::ErrorWithWarnings(..))
    }

    /// Splits the outcome into its context, errors and warnings.
    pub fn into_parts(self) -> (Option<ExecutionContext>, Vec<FlowException>, Vec<FlowException>) {
        match self {
            Self::Success(ctx) => (Some(ctx), Vec::new(), Vec::new()),
            Self::SuccessWithWarnings(ctx, warnings) => (Some(ctx), Vec::new(), warnings),
            Self::Error(ctx, errors) => (Some(ctx), errors, Vec::new()),
            Self::ErrorWithWarnings(ctx, errors, warnings) => (Some(ctx), errors, warnings),
            Self::Empty => (None, Vec::new(), Vec::new()),
        }
    }
}

/// A unit of work wrapped by a step flow.
///
/// Returning `Err` is the equivalent of throwing: the engine records the
/// error as a single technical exception (or keeps its kind when the error
/// is itself a [`FlowException`]).
///
/// # Examples
///
/// ```
/// use kumiki_core::{BoxError, ExecutionContext, Metadata, Step, StepOutcome};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct LoadCustomer;
///
/// #[async_trait]
/// impl Step for LoadCustomer {
///     async fn execute(
///         &self,
///         ctx: ExecutionContext,
///         _metadata: &Metadata,
///     ) -> Result<StepOutcome, BoxError> {
///         ctx.insert("customer", "Alice".to_string());
///         Ok(StepOutcome::success(ctx))
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Runs the unit of work against the shared context.
    async fn execute(&self, ctx: ExecutionContext, metadata: &Metadata)
        -> Result<StepOutcome, BoxError>;
}

/// Per-step execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepConfig {
    /// Maximum time the step body may run. `None` means no limit.
    pub timeout: Option<Duration>,
}

/// Retry schedule for a retryable flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Same pause after every failed attempt.
    Fixed {
        /// Number of attempts after the first one.
        retries: u32,
        delay: Duration,
    },
    /// Pause grows by `multiplier` after each failed attempt, capped at `max_delay`.
    ExponentialBackoff {
        retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: u32,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Error returned when [`RetryPolicy`] configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicyError(pub &'static str);

impl fmt::Display for RetryPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RetryPolicyError {}

impl RetryPolicy {
    /// Retries up to `retries` times, pausing `delay` between attempts.
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed { retries, delay }
    }

    /// Exponential backoff doubling from `initial_delay`, capped at 60s.
    pub fn exponential(retries: u32, initial_delay: Duration) -> Self {
        RetryPolicy::ExponentialBackoff {
            retries,
            initial_delay,
            max_delay: Duration::from_secs(60),
            multiplier: 2,
        }
    }

    /// Exponential backoff with custom settings.
    ///
    /// # Errors
    ///
    /// Returns [`RetryPolicyError`] if `multiplier` is 0 or greater than 10,
    /// or if `max_delay` is less than `initial_delay`.
    pub fn exponential_backoff(
        retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: u32,
    ) -> Result<Self, RetryPolicyError> {
        if multiplier == 0 {
            return Err(RetryPolicyError("multiplier must be greater than 0"));
        }
        if multiplier > 10 {
            return Err(RetryPolicyError(
                "multiplier must be 10 or less to avoid overflow",
            ));
        }
        if max_delay < initial_delay {
            return Err(RetryPolicyError("max_delay must be >= initial_delay"));
        }
        Ok(RetryPolicy::ExponentialBackoff {
            retries,
            initial_delay,
            max_delay,
            multiplier,
        })
    }

    /// Returns the number of attempts allowed after the first one.
    pub fn retries(&self) -> u32 {
        match self {
            RetryPolicy::Fixed { retries, .. } => *retries,
            RetryPolicy::ExponentialBackoff { retries, .. } => *retries,
        }
    }

    /// Returns the pause that follows failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let factor = (*multiplier as u64).saturating_pow(attempt);
                let delay = (initial_delay.as_millis() as u64).saturating_mul(factor);
                Duration::from_millis(delay.min(max_delay.as_millis() as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct WarnStep;

    #[async_trait]
    impl Step for WarnStep {
        async fn execute(
            &self,
            ctx: ExecutionContext,
            _metadata: &Metadata,
        ) -> Result<StepOutcome, BoxError> {
            ctx.insert("warned", true);
            Ok(StepOutcome::success_with_warnings(
                ctx,
                [FlowException::functional("stale cache")],
            ))
        }
    }

    #[tokio::test]
    async fn test_step_execution() {
        let ctx = ExecutionContext::new();
        let outcome = WarnStep
            .execute(ctx.clone(), &Metadata::new())
            .await
            .unwrap();

        let (next, errors, warnings) = outcome.into_parts();
        assert!(next.unwrap().same_as(&ctx));
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(ctx.get::<bool>("warned").as_deref(), Some(&true));
    }

    #[test]
    fn test_flow_name() {
        let name = FlowName::new("load");
        assert_eq!(name.as_str(), "load");
        assert_eq!(name, "load");
        assert!(FlowName::new("  ").is_blank());
    }

    #[test]
    fn test_empty_outcome_has_no_context() {
        let outcome = StepOutcome::empty();
        assert!(!outcome.is_error());
        assert!(outcome.into_parts().0.is_none());
    }

    #[test]
    fn test_retry_policy_fixed() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
        assert_eq!(policy.retries(), 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(250));
    }

    #[test]
    fn test_retry_policy_exponential() {
        let policy = RetryPolicy::exponential_backoff(
            5,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2,
        )
        .unwrap();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_validation() {
        let zero = RetryPolicy::exponential_backoff(
            3,
            Duration::from_millis(100),
            Duration::from_secs(10),
            0,
        );
        assert_eq!(zero.unwrap_err().0, "multiplier must be greater than 0");

        let inverted = RetryPolicy::exponential_backoff(
            3,
            Duration::from_secs(10),
            Duration::from_millis(100),
            2,
        );
        assert_eq!(inverted.unwrap_err().0, "max_delay must be >= initial_delay");
    }
}
