use super::{require, require_name};
use crate::flow::{Flow, FlowNode, Settled};
use crate::record::ExecutionRecord;
use kumiki_core::{
    ExecutionContext, FlowError, FlowName, Metadata, RecoverableSelector, RetryPolicy,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Re-runs a flow until it succeeds, the retries run out, or it fails with
/// an error the selector does not cover.
pub(crate) struct RetryableFlow {
    /// The original flow followed by one renamed copy per retry.
    attempts: Vec<Flow>,
    retry_on: RecoverableSelector,
    policy: RetryPolicy,
}

impl RetryableFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        self.attempts.iter().collect()
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let mut ctx = ctx;
        let mut attempts = self.attempts.iter().enumerate();
        let last = self.attempts.len().saturating_sub(1);

        for (index, attempt) in attempts.by_ref() {
            let Settled {
                context,
                record: mut child,
            } = attempt.execute(ctx, metadata.clone()).await;
            ctx = context;

            if !child.has_errors() {
                if index > 0 {
                    info!("'{}' succeeded on attempt {}", attempt.name(), index + 1);
                }
                record.push_child(child);
                break;
            }
            if index == last {
                warn!(
                    "'{}' failed after {} attempt(s)",
                    record.name(),
                    self.attempts.len()
                );
                record.push_child(child);
                break;
            }
            if !self.retry_on.matches_all(child.all_errors()) {
                debug!(
                    "Errors of '{}' are not {} retryable, giving up",
                    attempt.name(),
                    self.retry_on
                );
                record.push_child(child);
                break;
            }

            let recovered = child.recover();
            record.push_child(child);
            let delay = self.policy.delay_for_attempt(index as u32);
            info!(
                "Attempt {} of '{}' failed with {} error(s), retrying in {:?}",
                index + 1,
                record.name(),
                recovered.len(),
                delay
            );
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }

        for (_, unused) in attempts {
            record.push_child(ExecutionRecord::ignored(unused));
        }
        ctx
    }
}

/// Builder for retryable flows.
pub struct RetryableFlowBuilder {
    name: FlowName,
    flow: Option<Flow>,
    retry_on: Option<RecoverableSelector>,
    policy: Option<RetryPolicy>,
}

impl RetryableFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            flow: None,
            retry_on: None,
            policy: None,
        }
    }

    /// The flow to attempt.
    pub fn flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn retry_on(mut self, selector: RecoverableSelector) -> Self {
        self.retry_on = Some(selector);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Shorthand for a fixed-delay policy.
    pub fn retries(self, retries: u32, delay: Duration) -> Self {
        self.policy(RetryPolicy::fixed(retries, delay))
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let flow = require(&self.name, "flow", self.flow)?;
        let retry_on = require(&self.name, "retry_on", self.retry_on)?;
        let policy = require(&self.name, "policy", self.policy)?;

        let retries = (1..=policy.retries())
            .map(|k| flow.clone_named(format!("{} (retry {k})", flow.name())));
        let attempts = std::iter::once(flow.clone()).chain(retries).collect();
        Ok(Flow::new(
            self.name,
            FlowNode::Retryable(RetryableFlow {
                attempts,
                retry_on,
                policy,
            }),
        ))
    }
}
