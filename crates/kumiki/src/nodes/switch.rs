use super::{push_branches, require, require_name};
use crate::flow::{Flow, FlowNode, Settled};
use crate::invoke::guard;
use crate::record::ExecutionRecord;
use kumiki_core::{BoxError, ExecutionContext, FlowError, FlowName, Metadata};
use std::sync::Arc;
use tracing::{debug, warn};

type SelectorFn = Arc<dyn Fn(&ExecutionContext) -> Result<String, BoxError> + Send + Sync>;

/// Multi-way branch keyed by a selector over the context.
pub(crate) struct SwitchFlow {
    selector: SelectorFn,
    cases: Vec<(String, Flow)>,
    default: Flow,
}

impl SwitchFlow {
    pub(crate) fn children(&self) -> Vec<&Flow> {
        self.cases
            .iter()
            .map(|(_, flow)| flow)
            .chain(std::iter::once(&self.default))
            .collect()
    }

    pub(crate) async fn run(
        &self,
        record: &mut ExecutionRecord,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> ExecutionContext {
        let branches = self.children();
        let key = match guard(|| (self.selector)(&ctx)) {
            Ok(key) => key,
            Err(exception) => {
                warn!("Selector of '{}' failed", record.name());
                record.push_error(exception);
                push_branches(record, &branches, None);
                return ctx;
            }
        };

        let (index, branch) = match self.cases.iter().position(|(case, _)| *case == key) {
            Some(index) => (index, &self.cases[index].1),
            None => {
                debug!("No case for key '{}', using default", key);
                (self.cases.len(), &self.default)
            }
        };
        debug!("Selected '{}' for key '{}'", branch.name(), key);

        let Settled {
            context,
            record: child,
        } = branch.execute(ctx, metadata.clone()).await;
        push_branches(record, &branches, Some((index, child)));
        context
    }
}

/// Builder for switch flows.
pub struct SwitchFlowBuilder {
    name: FlowName,
    selector: Option<SelectorFn>,
    cases: Vec<(String, Flow)>,
    default: Option<Flow>,
}

impl SwitchFlowBuilder {
    pub(crate) fn new(name: FlowName) -> Self {
        Self {
            name,
            selector: None,
            cases: Vec::new(),
            default: None,
        }
    }

    pub fn selector<K, F>(self, selector: F) -> Self
    where
        K: Into<String>,
        F: Fn(&ExecutionContext) -> K + Send + Sync + 'static,
    {
        self.try_selector(move |ctx| Ok(selector(ctx).into()))
    }

    /// Fallible form of [`selector`](Self::selector). An `Err` fails the
    /// node and no case runs.
    pub fn try_selector<F>(mut self, selector: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.selector = Some(Arc::new(selector));
        self
    }

    /// Adds a case. Keys must be unique.
    pub fn case(mut self, key: impl Into<String>, flow: Flow) -> Self {
        self.cases.push((key.into(), flow));
        self
    }

    /// Flow run when no case matches.
    pub fn default(mut self, flow: Flow) -> Self {
        self.default = Some(flow);
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        require_name(&self.name)?;
        let selector = require(&self.name, "selector", self.selector)?;
        let default = require(&self.name, "default", self.default)?;
        for (index, (key, _)) in self.cases.iter().enumerate() {
            if self.cases[..index].iter().any(|(seen, _)| seen == key) {
                return Err(FlowError::DuplicateCase {
                    flow: self.name.to_string(),
                    key: key.clone(),
                });
            }
        }
        Ok(Flow::new(
            self.name,
            FlowNode::Switch(SwitchFlow {
                selector,
                cases: self.cases,
                default,
            }),
        ))
    }
}
