use super::{require, require_name};
use crate::flow::{Flow, FlowNode};
use crate::invoke::guard_async;
use crate::record::ExecutionRecord;
use async_trait::async_trait;
use kumiki_core::{
    BoxError, ExecutionContext, FlowError, FlowException, FlowName, Metadata, Step, StepConfig,
    StepOutcome,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Leaf node wrapping a user step.
pub(crate) struct StepFlow {
    step: Arc<dyn Step>,
    config: StepConfig,
}

impl StepFlow {
    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let call = guard_async(self.step.execute(ctx.clone(), metadata));
        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Step '{}' timed out after {:?}", record.name(), limit);
                    Err(FlowException::technical(format!(
                        "step timed out after {limit:?}"
                    )))
                }
            },
            None => call.await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(exception) => {
                record.push_error(exception);
                return ctx;
            }
        };

        let reported_error = outcome.is_error();
        let (next, errors, warnings) = outcome.into_parts();
        if reported_error && errors.is_empty() {
            record.push_error(FlowException::functional(
                "step reported an error without details",
            ));
        }
        for error in errors {
            record.push_error(error);
        }
        for warning in warnings {
            record.push_warning(warning);
        }

        match next {
            Some(next) => next,
            None => {
                record.mark_empty();
                ctx
            }
        }
    }
}

/// Adapts an async closure into a [`Step`].
pub struct FnStep<F> {
    f: F,
}

impl<F> FnStep<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(ExecutionContext, Metadata) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepOutcome, BoxError>> + Send,
{
    async fn execute(
        &self,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        (self.f)(ctx, metadata.clone()).await
    }
}

/// Builder for step flows.
pub struct StepFlowBuilder {
    name: FlowName,
    step: Option<Arc<dyn Step>>,
    config: StepConfig,
}

impl StepFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            step: None,
            config: StepConfig::default(),
        }
    }

    /// Sets the unit of work.
    pub fn step<S: Step + 'static>(mut self, step: S) -> Self {
        self.step = Some(Arc::new(step));
        self
    }

    /// Sets the unit of work from an async closure.
    pub fn run_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(ExecutionContext, Metadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutcome, BoxError>> + Send + 'static,
    {
        self.step(FnStep::new(f))
    }

    /// Limits how long the step body may run.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let step = require(&self.name, "step", self.step)?;
        Ok(Flow::new(
            self.name,
            FlowNode::Step(StepFlow {
                step,
                config: self.config,
            }),
        ))
    }
}
