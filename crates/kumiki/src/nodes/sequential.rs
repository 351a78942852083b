use super::{require_name, require};
use crate::flow::{Flow, FlowNode, Settled};
use crate::record::ExecutionRecord;
use kumiki_core::{ExecutionContext, FlowError, FlowException, FlowName, Metadata};
use tracing::debug;

/// Runs its steps one after another, stopping at the first failure, then
/// always runs the optional finally flow.
pub(crate) struct SequentialFlow {
    steps: Vec<Flow>,
    finally: Option<Flow>,
}

impl SequentialFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        self.steps.iter().chain(self.finally.as_ref()).collect()
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let mut ctx = ctx;
        let mut failed = false;

        for step in &self.steps {
            if failed {
                debug!("Skipping '{}' after an earlier failure", step.name());
                record.push_child(ExecutionRecord::ignored(step));
                continue;
            }
            let Settled {
                context,
                record: child,
            } = step.execute(ctx, metadata.clone()).await;
            ctx = context;
            failed = child.has_errors();
            record.push_child(child);
        }

        let Some(finally) = &self.finally else {
            return ctx;
        };

        let errors: Vec<FlowException> = record.all_errors().into_iter().cloned().collect();
        let warnings: Vec<FlowException> = record.all_warnings().into_iter().cloned().collect();
        debug!(
            "Running finally flow '{}' with {} carried error(s)",
            finally.name(),
            errors.len()
        );

        let Settled {
            context,
            record: child,
        } = finally
            .execute(ctx, metadata.clone().carrying(errors, warnings))
            .await;
        if !child.yielded() {
            record.push_error(FlowException::technical(format!(
                "finally flow '{}' produced no outcome",
                finally.name()
            )));
        }
        record.push_child(child);
        context
    }
}

/// Builder for sequential flows.
pub struct SequentialFlowBuilder {
    name: FlowName,
    steps: Vec<Flow>,
    finally: Option<Flow>,
}

impl SequentialFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            steps: Vec::new(),
            finally: None,
        }
    }

    /// Appends a step.
    pub fn then(mut self, step: Flow) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Flow>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Sets the flow that runs after the steps whether or not they failed.
    pub fn finally(mut self, finally: Flow) -> Self {
        self.finally = Some(finally);
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let steps = require(
            &self.name,
            "steps",
            Some(self.steps).filter(|steps| !steps.is_empty()),
        )?;
        Ok(Flow::new(
            self.name,
            FlowNode::Sequential(SequentialFlow {
                steps,
                finally: self.finally,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kumiki_core::{BoxError, FlowStatus, Step, StepOutcome};

    #[derive(Debug)]
    struct Writes(&'static str);

    #[async_trait]
    impl Step for Writes {
        async fn execute(
            &self,
            ctx: ExecutionContext,
            metadata: &Metadata,
        ) -> Result<StepOutcome, BoxError> {
            ctx.insert(self.0, self.0.to_string());
            ctx.insert(format!("{}.carried_errors", self.0), metadata.errors().len());
            Ok(StepOutcome::success(ctx))
        }
    }

    #[derive(Debug)]
    struct Fails;

    #[async_trait]
    impl Step for Fails {
        async fn execute(
            &self,
            ctx: ExecutionContext,
            _metadata: &Metadata,
        ) -> Result<StepOutcome, BoxError> {
            Ok(StepOutcome::error(
                ctx,
                [FlowException::functional("invalid order")],
            ))
        }
    }

    #[derive(Debug)]
    struct Silent;

    #[async_trait]
    impl Step for Silent {
        async fn execute(
            &self,
            _ctx: ExecutionContext,
            _metadata: &Metadata,
        ) -> Result<StepOutcome, BoxError> {
            Ok(StepOutcome::empty())
        }
    }

    fn step<S: Step + 'static>(name: &str, step: S) -> Flow {
        Flow::step(name).step(step).build().expect("valid flow")
    }

    #[tokio::test]
    async fn test_runs_steps_in_order() {
        let flow = Flow::sequential("abc")
            .then(step("A", Writes("A")))
            .then(step("B", Writes("B")))
            .then(step("C", Writes("C")))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Success);
        for key in ["A", "B", "C"] {
            assert_eq!(report.context().get_cloned::<String>(key), Some(key.to_string()));
        }
        assert!(report.errors().is_empty());
        assert!(report.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_failure_skips_rest_but_runs_finally() {
        let flow = Flow::sequential("checkout")
            .then(step("A", Writes("A")))
            .then(step("B", Fails))
            .then(step("C", Writes("C")))
            .finally(step("cleanup", Writes("cleanup")))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Error);
        assert!(!report.context().contains_key("C"));
        assert!(report.context().contains_key("cleanup"));
        assert_eq!(
            report.context().get_cloned::<usize>("cleanup.carried_errors"),
            Some(1)
        );
        assert_eq!(report.find("C").map(|r| r.status()), Some(FlowStatus::Ignored));
        assert_eq!(
            report.find("cleanup").map(|r| r.status()),
            Some(FlowStatus::Success)
        );
    }

    #[tokio::test]
    async fn test_failing_finally_fails_the_sequence() {
        let flow = Flow::sequential("wrapped")
            .then(step("A", Writes("A")))
            .finally(step("cleanup", Fails))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;
        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_finally_without_outcome_is_an_error() {
        let flow = Flow::sequential("wrapped")
            .then(step("A", Writes("A")))
            .finally(step("cleanup", Silent))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;
        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.root().errors().len(), 1);
        assert_eq!(
            report.find("cleanup").map(|r| r.status()),
            Some(FlowStatus::Success)
        );
    }

    #[tokio::test]
    async fn test_nested_finally_without_outcome_is_an_error() {
        let cleanup = Flow::sequential("cleanup")
            .then(step("release", Writes("release")))
            .then(step("silent", Silent))
            .build()
            .expect("valid flow");
        let flow = Flow::sequential("wrapped")
            .then(step("A", Writes("A")))
            .finally(cleanup)
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.root().errors().len(), 1);
        assert!(report.context().contains_key("release"));
    }

    #[tokio::test]
    async fn test_finally_ending_with_an_outcome_is_fine() {
        let cleanup = Flow::sequential("cleanup")
            .then(step("silent", Silent))
            .then(step("release", Writes("release")))
            .build()
            .expect("valid flow");
        let flow = Flow::sequential("wrapped")
            .then(step("A", Writes("A")))
            .finally(cleanup)
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;
        assert_eq!(report.status(), FlowStatus::Success);
        assert!(report.errors().is_empty());
    }

    #[test]
    fn test_builder_requires_steps() {
        let error = Flow::sequential("empty").build().unwrap_err();
        assert!(matches!(
            error,
            FlowError::MissingField { field: "steps", .. }
        ));
    }
}
