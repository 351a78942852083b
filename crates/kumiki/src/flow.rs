//! Flow tree description and the single execution dispatch point.

use crate::nodes::{
    ConditionalFlow, ConditionalFlowBuilder, ParallelFlow, ParallelFlowBuilder, RecoverableFlow,
    RecoverableFlowBuilder, RetryableFlow, RetryableFlowBuilder, SequentialFlow,
    SequentialFlowBuilder, StepFlow, StepFlowBuilder, SwitchFlow, SwitchFlowBuilder,
};
use crate::policy::StatusPolicy;
use crate::record::ExecutionRecord;
use crate::report::Report;
use futures::future::BoxFuture;
use futures::FutureExt;
use kumiki_core::{ExecutionContext, FlowName, FlowStatus, Metadata};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, info, warn, Instrument};

/// The node types a flow tree is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlowKind {
    Step,
    Sequential,
    Parallel,
    Conditional,
    Switch,
    Recoverable,
    Retryable,
    NoOp,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlowKind::Step => "Step",
            FlowKind::Sequential => "Sequential",
            FlowKind::Parallel => "Parallel",
            FlowKind::Conditional => "Conditional",
            FlowKind::Switch => "Switch",
            FlowKind::Recoverable => "Recoverable",
            FlowKind::Retryable => "Retryable",
            FlowKind::NoOp => "NoOp",
        };
        write!(f, "{label}")
    }
}

pub(crate) enum FlowNode {
    Step(StepFlow),
    Sequential(SequentialFlow),
    Parallel(ParallelFlow),
    Conditional(ConditionalFlow),
    Switch(SwitchFlow),
    Recoverable(RecoverableFlow),
    Retryable(RetryableFlow),
    NoOp,
}

impl FlowNode {
    fn kind(&self) -> FlowKind {
        match self {
            FlowNode::Step(_) => FlowKind::Step,
            FlowNode::Sequential(_) => FlowKind::Sequential,
            FlowNode::Parallel(_) => FlowKind::Parallel,
            FlowNode::Conditional(_) => FlowKind::Conditional,
            FlowNode::Switch(_) => FlowKind::Switch,
            FlowNode::Recoverable(_) => FlowKind::Recoverable,
            FlowNode::Retryable(_) => FlowKind::Retryable,
            FlowNode::NoOp => FlowKind::NoOp,
        }
    }

    fn policy(&self) -> StatusPolicy {
        match self {
            FlowNode::Step(_)
            | FlowNode::Sequential(_)
            | FlowNode::Parallel(_)
            | FlowNode::NoOp => StatusPolicy::AllSucceeded,
            FlowNode::Conditional(_)
            | FlowNode::Switch(_)
            | FlowNode::Recoverable(_)
            | FlowNode::Retryable(_) => StatusPolicy::AnySucceeded,
        }
    }

    fn children(&self) -> Vec<&Flow> {
        match self {
            FlowNode::Step(_) | FlowNode::NoOp => Vec::new(),
            FlowNode::Sequential(node) => node.children(),
            FlowNode::Parallel(node) => node.children(),
            FlowNode::Conditional(node) => node.children(),
            FlowNode::Switch(node) => node.children(),
            FlowNode::Recoverable(node) => node.children(),
            FlowNode::Retryable(node) => node.children(),
        }
    }
}

/// Context and record produced by one node execution.
pub(crate) struct Settled {
    pub(crate) context: ExecutionContext,
    pub(crate) record: ExecutionRecord,
}

/// An immutable flow tree (or subtree).
///
/// A `Flow` only describes what to run. Each execution produces a fresh
/// [`ExecutionRecord`] tree, so the same flow can be run any number of
/// times, concurrently, and cloning it is cheap.
///
/// Flows are assembled with the builders reached from [`Flow::step`],
/// [`Flow::sequential`], [`Flow::parallel`], [`Flow::conditional`],
/// [`Flow::switch`], [`Flow::recoverable`], [`Flow::retryable`] and
/// [`Flow::noop`].
#[derive(Clone)]
pub struct Flow {
    name: FlowName,
    node: Arc<FlowNode>,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("children", &self.children())
            .finish()
    }
}

impl Flow {
    pub(crate) fn new(name: FlowName, node: FlowNode) -> Self {
        Self {
            name,
            node: Arc::new(node),
        }
    }

    /// Starts building a leaf that runs a [`Step`](kumiki_core::Step).
    pub fn step(name: impl Into<FlowName>) -> StepFlowBuilder {
        StepFlowBuilder::new(name.into())
    }

    /// Starts building a sequence.
    pub fn sequential(name: impl Into<FlowName>) -> SequentialFlowBuilder {
        SequentialFlowBuilder::new(name.into())
    }

    /// Starts building a parallel fan-out.
    pub fn parallel(name: impl Into<FlowName>) -> ParallelFlowBuilder {
        ParallelFlowBuilder::new(name.into())
    }

    /// Starts building a two-way branch.
    pub fn conditional(name: impl Into<FlowName>) -> ConditionalFlowBuilder {
        ConditionalFlowBuilder::new(name.into())
    }

    /// Starts building a multi-way branch.
    pub fn switch(name: impl Into<FlowName>) -> SwitchFlowBuilder {
        SwitchFlowBuilder::new(name.into())
    }

    /// Starts building a fallback-on-error node.
    pub fn recoverable(name: impl Into<FlowName>) -> RecoverableFlowBuilder {
        RecoverableFlowBuilder::new(name.into())
    }

    /// Starts building a bounded retry.
    pub fn retryable(name: impl Into<FlowName>) -> RetryableFlowBuilder {
        RetryableFlowBuilder::new(name.into())
    }

    /// A leaf that does nothing and always succeeds.
    pub fn noop(name: impl Into<FlowName>) -> Flow {
        Flow::new(name.into(), FlowNode::NoOp)
    }

    pub fn name(&self) -> &FlowName {
        &self.name
    }

    pub fn kind(&self) -> FlowKind {
        self.node.kind()
    }

    /// Child flows in declaration order.
    ///
    /// A fan-out parallel flow reports its template here; the per-element
    /// clones only exist in the execution record.
    pub fn children(&self) -> Vec<&Flow> {
        self.node.children()
    }

    /// Returns a structurally identical flow under a new name.
    pub fn clone_named(&self, name: impl Into<FlowName>) -> Flow {
        Flow {
            name: name.into(),
            node: Arc::clone(&self.node),
        }
    }

    /// Runs this flow as the root of a tree.
    ///
    /// Never fails: every problem is reported through the returned
    /// [`Report`]'s status and exception lists.
    pub async fn run(&self, ctx: ExecutionContext) -> Report {
        info!("Running flow '{}'", self.name);
        let Settled { context, record } = self.execute(ctx, Metadata::new()).await;
        info!(
            "Flow '{}' finished with status {} in {:?}",
            self.name,
            record.status(),
            record.duration()
        );
        Report::new(context, record)
    }

    /// Executes this node and, through it, its subtree.
    pub(crate) fn execute(
        &self,
        ctx: ExecutionContext,
        metadata: Metadata,
    ) -> BoxFuture<'_, Settled> {
        let span = debug_span!("flow", name = %self.name, kind = %self.kind());
        async move {
            let mut record = ExecutionRecord::pending(self);
            record.start();
            debug!("Flow '{}' started", self.name);

            let context = match self.node.as_ref() {
                FlowNode::Step(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Sequential(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Parallel(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Conditional(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Switch(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Recoverable(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::Retryable(node) => node.run(&mut record, ctx, &metadata).await,
                FlowNode::NoOp => ctx,
            };

            record.finish(self.node.policy());
            match record.status() {
                FlowStatus::Error => warn!(
                    "Flow '{}' failed with {} error(s)",
                    self.name,
                    record.errors().len()
                ),
                status => debug!("Flow '{}' completed with status {}", self.name, status),
            }

            Settled { context, record }
        }
        .instrument(span)
        .boxed()
    }
}
