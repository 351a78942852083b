//! An embeddable flow orchestration engine for Rust.
//!
//! Steps are composed into an immutable tree of combinators (sequence,
//! parallel fan-out, conditional and switch branches, fallback on error and
//! bounded retry) that run over one shared [`ExecutionContext`]. Every run
//! settles into a [`Report`]; failures are recorded, never returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use kumiki::prelude::*;
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct Greet;
//!
//! #[async_trait]
//! impl Step for Greet {
//!     async fn execute(
//!         &self,
//!         ctx: ExecutionContext,
//!         _metadata: &Metadata,
//!     ) -> Result<StepOutcome, BoxError> {
//!         ctx.insert("greeting", "hello".to_string());
//!         Ok(StepOutcome::success(ctx))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FlowError> {
//!     let flow = Flow::sequential("hello")
//!         .then(Flow::step("greet").step(Greet).build()?)
//!         .build()?;
//!
//!     let report = flow.run(ExecutionContext::new()).await;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

mod flow;
mod invoke;
mod nodes;
mod policy;
mod record;
mod report;

// Re-export core types
pub use kumiki_core::*;

pub use flow::{Flow, FlowKind};
pub use nodes::{
    ConditionalFlowBuilder, FnStep, ParallelFlowBuilder, RecoverableFlowBuilder,
    RetryableFlowBuilder, SequentialFlowBuilder, StepFlowBuilder, SwitchFlowBuilder,
};
pub use policy::{all_succeeded, any_succeeded, any_warning, StatusPolicy};
pub use record::ExecutionRecord;
pub use report::{RenderStyle, Report};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoxError, ExecutionContext, Flow, FlowError, FlowException, FlowStatus, Metadata,
        RecoverableSelector, RenderStyle, Report, RetryPolicy, Step, StepConfig, StepOutcome,
    };
}
