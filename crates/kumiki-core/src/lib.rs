//! Core types for the kumiki flow orchestration engine.
//!
//! This crate holds the vocabulary shared by the engine and by step
//! implementations. Library authors writing steps only need this crate.
//!
//! # Core Types
//!
//! - [`Step`] - The unit of work wrapped by a step flow
//! - [`StepOutcome`] - What a step reports back
//! - [`ExecutionContext`] - Shared, concurrently writable key/value store
//! - [`Metadata`] - Payload and carried errors handed down to children
//! - [`FlowException`] - Technical or functional failure recorded on a node
//! - [`RecoverableSelector`] - Which failures a recovery or retry may absorb
//! - [`FlowStatus`] - Settled node status
//! - [`FlowError`] - Construction-time errors

mod context;
mod error;
mod exception;
mod metadata;
mod status;
mod step;

pub use context::{ContextKey, ExecutionContext};
pub use error::FlowError;
pub use exception::{BoxError, ExceptionKind, FlowException, RecoverableSelector};
pub use metadata::{Metadata, Payload};
pub use status::FlowStatus;
pub use step::{FlowName, RetryPolicy, RetryPolicyError, Step, StepConfig, StepOutcome};
