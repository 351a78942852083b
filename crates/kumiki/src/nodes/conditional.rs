use super::{push_branches, require, require_name};
use crate::flow::{Flow, FlowNode, Settled};
use crate::invoke::guard;
use crate::record::ExecutionRecord;
use kumiki_core::{BoxError, ExecutionContext, FlowError, FlowName, Metadata};
use std::sync::Arc;
use tracing::{debug, warn};

type PredicateFn = Arc<dyn Fn(&ExecutionContext) -> Result<bool, BoxError> + Send + Sync>;

/// Two-way branch on a predicate over the context.
pub(crate) struct ConditionalFlow {
    predicate: PredicateFn,
    when_true: Flow,
    when_false: Flow,
}

impl ConditionalFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        vec![&self.when_true, &self.when_false]
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let branches = self.children();
        let outcome = match guard(|| (self.predicate)(&ctx)) {
            Ok(outcome) => outcome,
            Err(exception) => {
                warn!("Predicate of '{}' failed", record.name());
                record.push_error(exception);
                push_branches(record, &branches, None);
                return ctx;
            }
        };

        let (index, branch) = if outcome {
            (0, &self.when_true)
        } else {
            (1, &self.when_false)
        };
        debug!("Predicate is {}, taking '{}'", outcome, branch.name());

        let Settled {
            context,
            record: child,
        } = branch.execute(ctx, metadata.clone()).await;
        push_branches(record, &branches, Some((index, child)));
        context
    }
}

/// Builder for conditional flows.
pub struct ConditionalFlowBuilder {
    name: FlowName,
    predicate: Option<PredicateFn>,
    when_true: Option<Flow>,
    when_false: Option<Flow>,
}

impl ConditionalFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            predicate: None,
            when_true: None,
            when_false: None,
        }
    }

    pub fn predicate<F>(self, predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        self.try_predicate(move |ctx| Ok(predicate(ctx)))
    }

    /// Fallible form of [`predicate`](Self::predicate). An `Err` fails the
    /// node and neither branch runs.
    pub fn try_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn when_true(mut self, flow: Flow) -> Self {
        self.when_true = Some(flow);
        self
    }

    pub fn when_false(mut self, flow: Flow) -> Self {
        self.when_false = Some(flow);
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let predicate = require(&self.name, "predicate", self.predicate)?;
        let when_true = require(&self.name, "when_true", self.when_true)?;
        let when_false = require(&self.name, "when_false", self.when_false)?;
        Ok(Flow::new(
            self.name,
            FlowNode::Conditional(ConditionalFlow {
                predicate,
                when_true,
                when_false,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumiki_core::{FlowStatus, StepOutcome};

    fn marker(name: &'static str) -> Flow {
        Flow::step(name)
            .run_fn(move |ctx, _metadata| async move {
                ctx.insert(name, true);
                Ok::<_, BoxError>(StepOutcome::success(ctx))
            })
            .build()
            .expect("valid flow")
    }

    fn express_check() -> ConditionalFlowBuilder {
        Flow::conditional("express?")
            .when_true(marker("express"))
            .when_false(marker("standard"))
    }

    #[tokio::test]
    async fn test_takes_true_branch() {
        let flow = express_check()
            .predicate(|ctx| ctx.contains_key("premium"))
            .build()
            .expect("valid flow");

        let ctx = ExecutionContext::new();
        ctx.insert("premium", ());
        let report = flow.run(ctx).await;

        assert_eq!(report.status(), FlowStatus::Success);
        assert!(report.context().contains_key("express"));
        assert!(!report.context().contains_key("standard"));
        assert_eq!(
            report.find("standard").map(|r| r.status()),
            Some(FlowStatus::Ignored)
        );
    }

    #[tokio::test]
    async fn test_takes_false_branch() {
        let flow = express_check()
            .predicate(|ctx| ctx.contains_key("premium"))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Success);
        assert!(report.context().contains_key("standard"));
        let children = report.root().children();
        assert_eq!(children[0].status(), FlowStatus::Ignored);
        assert_eq!(children[1].status(), FlowStatus::Success);
    }

    #[tokio::test]
    async fn test_failing_predicate_runs_no_branch() {
        let flow = express_check()
            .try_predicate(|_ctx| Err("no customer".into()))
            .build()
            .expect("valid flow");

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.errors().len(), 1);
        assert!(report.errors()[0].is_technical());
        assert!(!report.context().contains_key("express"));
        assert!(!report.context().contains_key("standard"));
    }

    #[test]
    fn test_builder_requires_both_branches() {
        let error = Flow::conditional("half")
            .predicate(|_ctx| true)
            .when_true(Flow::noop("yes"))
            .build()
            .unwrap_err();
        assert!(matches!(
            error,
            FlowError::MissingField {
                field: "when_false",
                ..
            }
        ));
    }
}
