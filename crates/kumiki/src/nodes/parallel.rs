use super::{require, require_name};
use crate::flow::{Flow, FlowNode, Settled};
use crate::invoke::guard;
use crate::record::ExecutionRecord;
use futures::future::join_all;
use kumiki_core::{
    BoxError, ExecutionContext, FlowError, FlowException, FlowName, Metadata, Payload,
};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

type MergeFn = Arc<
    dyn Fn(ExecutionContext, ExecutionContext) -> Result<ExecutionContext, BoxError>
        + Send
        + Sync,
>;
type ItemsFn = Arc<dyn Fn(&ExecutionContext) -> Result<Vec<Payload>, BoxError> + Send + Sync>;

enum Branches {
    /// Explicit children started together.
    Fixed(Vec<Flow>),
    /// One clone of `template` per extracted item.
    FanOut { template: Flow, items: ItemsFn },
}

/// Runs its branches concurrently and joins on all of them.
pub(crate) struct ParallelFlow {
    branches: Branches,
    merge: Option<MergeFn>,
}

impl ParallelFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        match &self.branches {
            Branches::Fixed(branches) => branches.iter().collect(),
            Branches::FanOut { template, .. } => vec![template],
        }
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let launches: Vec<(Flow, Metadata)> = match &self.branches {
            Branches::Fixed(branches) => branches
                .iter()
                .map(|branch| (branch.clone(), metadata.clone()))
                .collect(),
            Branches::FanOut { template, items } => {
                let items = match guard(|| items(&ctx)) {
                    Ok(items) => items,
                    Err(exception) => {
                        warn!("Item extraction failed for '{}'", record.name());
                        record.push_error(exception);
                        return ctx;
                    }
                };
                debug!(
                    "Fanning out '{}' over {} item(s)",
                    template.name(),
                    items.len()
                );
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let clone =
                            template.clone_named(format!("{} ({})", template.name(), index + 1));
                        (clone, metadata.clone().with_shared_payload(item))
                    })
                    .collect()
            }
        };

        let handles: Vec<_> = launches
            .iter()
            .map(|(branch, metadata)| {
                let branch = branch.clone();
                let metadata = metadata.clone();
                let ctx = ctx.clone();
                tokio::spawn(
                    async move {
                        let Settled { context, record } = branch.execute(ctx, metadata).await;
                        (context, record)
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let mut contexts = Vec::with_capacity(handles.len());
        for ((branch, _), joined) in launches.iter().zip(join_all(handles).await) {
            match joined {
                Ok((context, child)) => {
                    contexts.push(context);
                    record.push_child(child);
                }
                Err(error) => {
                    warn!("Branch '{}' task failed: {}", branch.name(), error);
                    record.push_child(ExecutionRecord::crashed(
                        branch,
                        FlowException::technical(format!("branch task failed: {error}")),
                    ));
                }
            }
        }

        let Some(merge) = &self.merge else {
            return ctx;
        };
        let seed = ctx.clone();
        let merged = guard(|| {
            contexts
                .into_iter()
                .try_fold(seed, |acc, next| merge(acc, next))
        });
        match merged {
            Ok(merged) => merged,
            Err(exception) => {
                warn!(
                    "Context merge failed for '{}', keeping the original context",
                    record.name()
                );
                record.push_warning(exception);
                ctx
            }
        }
    }
}

/// Builder for parallel flows.
///
/// Either list the branches with [`branch`](Self::branch), or fan out a
/// single [`template`](Self::template) over the values produced by
/// [`items`](Self::items). Mixing both is a configuration error.
pub struct ParallelFlowBuilder {
    name: FlowName,
    branches: Vec<Flow>,
    template: Option<Flow>,
    items: Option<ItemsFn>,
    merge: Option<MergeFn>,
}

impl ParallelFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            branches: Vec::new(),
            template: None,
            items: None,
            merge: None,
        }
    }

    pub fn branch(mut self, branch: Flow) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn branches(mut self, branches: impl IntoIterator<Item = Flow>) -> Self {
        self.branches.extend(branches);
        self
    }

    /// Flow cloned once per extracted item.
    pub fn template(mut self, template: Flow) -> Self {
        self.template = Some(template);
        self
    }

    /// Extracts the fan-out items from the context. Each item becomes the
    /// payload of one clone's metadata.
    pub fn items<T, I, F>(self, items: F) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
        F: Fn(&ExecutionContext) -> I + Send + Sync + 'static,
    {
        self.try_items(move |ctx| Ok::<_, BoxError>(items(ctx)))
    }

    /// Fallible form of [`items`](Self::items).
    pub fn try_items<T, I, F>(mut self, items: F) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
        F: Fn(&ExecutionContext) -> Result<I, BoxError> + Send + Sync + 'static,
    {
        self.items = Some(Arc::new(
            move |ctx: &ExecutionContext| -> Result<Vec<Payload>, BoxError> {
                Ok(items(ctx)?
                    .into_iter()
                    .map(|item| Arc::new(item) as Payload)
                    .collect())
            },
        ));
        self
    }

    /// Folds the branch contexts, seeded with the context the node started
    /// with. Without a merge function the starting context is kept.
    pub fn merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(ExecutionContext, ExecutionContext) -> Result<ExecutionContext, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let fan_out = self.template.is_some() || self.items.is_some();
        let branches = if fan_out {
            if !self.branches.is_empty() {
                return Err(FlowError::Configuration(format!(
                    "parallel flow '{}' cannot combine explicit branches with a fan-out template",
                    self.name
                )));
            }
            Branches::FanOut {
                template: require(&self.name, "template", self.template)?,
                items: require(&self.name, "items", self.items)?,
            }
        } else {
            Branches::Fixed(require(
                &self.name,
                "branches",
                Some(self.branches).filter(|branches| !branches.is_empty()),
            )?)
        };
        Ok(Flow::new(
            self.name,
            FlowNode::Parallel(ParallelFlow {
                branches,
                merge: self.merge,
            }),
        ))
    }
}
