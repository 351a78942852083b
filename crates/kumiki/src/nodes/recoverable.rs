use super::{require, require_name};
use crate::flow::{Flow, FlowNode, Settled};
use crate::record::ExecutionRecord;
use kumiki_core::{
    ExecutionContext, FlowError, FlowException, FlowName, Metadata, RecoverableSelector,
};
use tracing::{debug, info};

/// Runs a primary flow and falls back to a second one when every error the
/// primary recorded is recoverable.
pub(crate) struct RecoverableFlow {
    primary: Flow,
    fallback: Flow,
    recover_on: RecoverableSelector,
}

impl RecoverableFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        vec![&self.primary, &self.fallback]
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let Settled {
            context,
            record: mut primary,
        } = self.primary.execute(ctx, metadata.clone()).await;

        if !primary.has_errors() {
            record.push_child(primary);
            record.push_child(ExecutionRecord::ignored(&self.fallback));
            return context;
        }

        if !self.recover_on.matches_all(primary.all_errors()) {
            debug!(
                "Errors of '{}' are not {} recoverable, keeping them",
                self.primary.name(),
                self.recover_on
            );
            record.push_child(primary);
            record.push_child(ExecutionRecord::ignored(&self.fallback));
            return context;
        }

        let recovered = primary.recover();
        info!(
            "Recovered {} error(s) from '{}', running fallback '{}'",
            recovered.len(),
            self.primary.name(),
            self.fallback.name()
        );
        let warnings: Vec<FlowException> = primary.all_warnings().into_iter().cloned().collect();
        record.push_child(primary);

        let Settled {
            context,
            record: fallback,
        } = self
            .fallback
            .execute(context, metadata.clone().carrying(recovered, warnings))
            .await;
        record.push_child(fallback);
        context
    }
}

/// Builder for recoverable flows.
pub struct RecoverableFlowBuilder {
    name: FlowName,
    primary: Option<Flow>,
    fallback: Option<Flow>,
    recover_on: Option<RecoverableSelector>,
}

impl RecoverableFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            primary: None,
            fallback: None,
            recover_on: None,
        }
    }

    /// The flow tried first.
    pub fn primary(mut self, flow: Flow) -> Self {
        self.primary = Some(flow);
        self
    }

    /// The flow run after a recovered failure. Its metadata carries the
    /// recovered errors.
    pub fn fallback(mut self, flow: Flow) -> Self {
        self.fallback = Some(flow);
        self
    }

    pub fn recover_on(mut self, selector: RecoverableSelector) -> Self {
        self.recover_on = Some(selector);
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let primary = require(&self.name, "primary", self.primary)?;
        let fallback = require(&self.name, "fallback", self.fallback)?;
        let recover_on = require(&self.name, "recover_on", self.recover_on)?;
        Ok(Flow::new(
            self.name,
            FlowNode::Recoverable(RecoverableFlow {
                primary,
                fallback,
                recover_on,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumiki_core::{BoxError, FlowStatus, StepOutcome};

    fn failing(name: &'static str, exception: fn() -> FlowException) -> Flow {
        Flow::step(name)
            .run_fn(move |ctx, _metadata| async move {
                Ok::<_, BoxError>(StepOutcome::error(ctx, [exception()]))
            })
            .build()
            .expect("valid flow")
    }

    fn fallback() -> Flow {
        Flow::step("cached")
            .run_fn(|ctx, metadata| async move {
                ctx.insert("cached", metadata.errors().len());
                Ok::<_, BoxError>(StepOutcome::success(ctx))
            })
            .build()
            .expect("valid flow")
    }

    fn recoverable(primary: Flow, selector: RecoverableSelector) -> Flow {
        Flow::recoverable("lookup")
            .primary(primary)
            .fallback(fallback())
            .recover_on(selector)
            .build()
            .expect("valid flow")
    }

    #[tokio::test]
    async fn test_recovers_matching_errors() {
        let flow = recoverable(
            failing("remote", || FlowException::technical("timeout")),
            RecoverableSelector::All,
        );

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Success);
        assert!(report.errors().is_empty());
        assert_eq!(report.recovered_errors().len(), 1);
        assert_eq!(report.context().get_cloned::<usize>("cached"), Some(1));
    }

    #[tokio::test]
    async fn test_mismatched_errors_stand() {
        let flow = recoverable(
            failing("remote", || FlowException::functional("unknown sku")),
            RecoverableSelector::Technical,
        );

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.errors().len(), 1);
        assert!(report.recovered_errors().is_empty());
        assert!(!report.context().contains_key("cached"));
        assert_eq!(
            report.find("cached").map(|r| r.status()),
            Some(FlowStatus::Ignored)
        );
    }

    #[tokio::test]
    async fn test_partial_match_blocks_recovery() {
        let primary = Flow::parallel("both")
            .branch(failing("a", || FlowException::technical("timeout")))
            .branch(failing("b", || FlowException::functional("rejected")))
            .build()
            .expect("valid flow");
        let flow = recoverable(primary, RecoverableSelector::Technical);

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Error);
        assert_eq!(report.errors().len(), 2);
        assert!(report.recovered_errors().is_empty());
    }

    #[tokio::test]
    async fn test_successful_primary_skips_fallback() {
        let flow = recoverable(Flow::noop("remote"), RecoverableSelector::All);

        let report = flow.run(ExecutionContext::new()).await;

        assert_eq!(report.status(), FlowStatus::Success);
        assert!(!report.context().contains_key("cached"));
    }

    #[test]
    fn test_builder_requires_selector() {
        let error = Flow::recoverable("lookup")
            .primary(Flow::noop("a"))
            .fallback(Flow::noop("b"))
            .build()
            .unwrap_err();
        assert!(matches!(
            error,
            FlowError::MissingField {
                field: "recover_on",
                ..
            }
        ));
    }
}
