//! Execution records: the per-run state of every node.

use crate::flow::{Flow, FlowKind};
use crate::policy::StatusPolicy;
use chrono::{DateTime, Utc};
use kumiki_core::{FlowException, FlowName, FlowStatus};
use serde::Serialize;
use std::time::Duration;

/// What happened to one node during one execution.
///
/// A flow description never holds state; every execution builds a fresh
/// record tree instead. Records of children that were not chosen (the
/// untaken branch of a conditional, steps skipped after a failure, unused
/// retry attempts) are present with status [`FlowStatus::Ignored`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    name: FlowName,
    kind: FlowKind,
    status: FlowStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    errors: Vec<FlowException>,
    warnings: Vec<FlowException>,
    recovered_errors: Vec<FlowException>,
    children: Vec<ExecutionRecord>,
    #[serde(skip)]
    yielded: bool,
}

impl ExecutionRecord {
    /// Record for a node that is about to run.
    pub(crate) fn pending(flow: &Flow) -> Self {
        Self {
            name: flow.name().clone(),
            kind: flow.kind(),
            status: FlowStatus::Ignored,
            started_at: None,
            finished_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            recovered_errors: Vec::new(),
            children: Vec::new(),
            yielded: true,
        }
    }

    /// Record for a node that never ran, including its static children.
    pub(crate) fn ignored(flow: &Flow) -> Self {
        let mut record = Self::pending(flow);
        record.children = flow.children().into_iter().map(Self::ignored).collect();
        record
    }

    /// Record for a node whose task died before it could settle.
    pub(crate) fn crashed(flow: &Flow, exception: FlowException) -> Self {
        let mut record = Self::pending(flow);
        record.start();
        record.push_error(exception);
        record.finish(StatusPolicy::AllSucceeded);
        record
    }

    pub(crate) fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    /// Stamps the end time and derives the final status.
    pub(crate) fn finish(&mut self, policy: StatusPolicy) {
        self.finished_at = Some(Utc::now());
        // A composite yields what its last executed child yielded, unless it
        // already failed on its own.
        if self.errors.is_empty() {
            if let Some(last) = self
                .children
                .iter()
                .rev()
                .find(|child| child.started_at.is_some())
            {
                self.yielded = last.yielded;
            }
        }
        self.status = policy.resolve(&self.errors, &self.warnings, &self.children);
    }

    pub(crate) fn push_error(&mut self, exception: FlowException) {
        self.errors.push(exception.originating_in(&self.name));
    }

    pub(crate) fn push_warning(&mut self, exception: FlowException) {
        self.warnings.push(exception.originating_in(&self.name));
    }

    pub(crate) fn push_child(&mut self, child: ExecutionRecord) {
        self.children.push(child);
    }

    pub(crate) fn mark_empty(&mut self) {
        self.yielded = false;
    }

    /// `false` when the node produced no outcome at all.
    pub(crate) fn yielded(&self) -> bool {
        self.yielded
    }

    /// Moves every active error in this subtree to the recovered list and
    /// returns copies of what was moved.
    pub(crate) fn recover(&mut self) -> Vec<FlowException> {
        let mut moved = Vec::new();
        self.recover_into(&mut moved);
        moved
    }

    fn recover_into(&mut self, moved: &mut Vec<FlowException>) {
        let errors = std::mem::take(&mut self.errors);
        moved.extend(errors.iter().cloned());
        self.recovered_errors.extend(errors);
        for child in &mut self.children {
            child.recover_into(moved);
        }
    }

    /// Returns `true` if this node or any descendant holds an active error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.children.iter().any(ExecutionRecord::has_errors)
    }

    /// Active errors of this node and all descendants, depth-first.
    pub fn all_errors(&self) -> Vec<&FlowException> {
        self.collect(|record| &record.errors)
    }

    /// Warnings of this node and all descendants, depth-first.
    pub fn all_warnings(&self) -> Vec<&FlowException> {
        self.collect(|record| &record.warnings)
    }

    /// Recovered errors of this node and all descendants, depth-first.
    pub fn all_recovered_errors(&self) -> Vec<&FlowException> {
        self.collect(|record| &record.recovered_errors)
    }

    fn collect<'a>(
        &'a self,
        field: fn(&ExecutionRecord) -> &Vec<FlowException>,
    ) -> Vec<&'a FlowException> {
        let mut out = Vec::new();
        self.walk(&mut |record| out.extend(field(record).iter()));
        out
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ExecutionRecord)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Finds the first record with the given name, depth-first.
    ///
    /// Names are not unique within a tree: the attempts of a retryable flow
    /// keep their names when the retryable itself is fanned out, so every
    /// clone holds records with the same names. Only the first match in
    /// pre-order is returned; walk [`children`](Self::children) to reach
    /// the others.
    pub fn find(&self, name: &str) -> Option<&ExecutionRecord> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn name(&self) -> &FlowName {
        &self.name
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall time between start and finish; zero for nodes that never ran.
    pub fn duration(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Errors recorded on this node only.
    pub fn errors(&self) -> &[FlowException] {
        &self.errors
    }

    /// Warnings recorded on this node only.
    pub fn warnings(&self) -> &[FlowException] {
        &self.warnings
    }

    /// Recovered errors recorded on this node only.
    pub fn recovered_errors(&self) -> &[FlowException] {
        &self.recovered_errors
    }

    pub fn children(&self) -> &[ExecutionRecord] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> ExecutionRecord {
        ExecutionRecord::pending(&Flow::noop(name))
    }

    #[test]
    fn test_pending_record_is_ignored() {
        let record = leaf("idle");
        assert_eq!(record.status(), FlowStatus::Ignored);
        assert_eq!(record.duration(), Duration::ZERO);
        assert!(record.yielded());
    }

    #[test]
    fn test_recover_moves_errors_of_whole_subtree() {
        let mut child = leaf("child");
        child.push_error(FlowException::technical("disk full"));
        let mut parent = leaf("parent");
        parent.push_error(FlowException::functional("rejected"));
        parent.push_child(child);

        let moved = parent.recover();

        assert_eq!(moved.len(), 2);
        assert!(!parent.has_errors());
        assert_eq!(parent.all_recovered_errors().len(), 2);
        assert_eq!(parent.children()[0].recovered_errors().len(), 1);
    }

    #[test]
    fn test_pushed_exceptions_are_attributed() {
        let mut record = leaf("charge");
        record.push_warning(FlowException::functional("retrying card"));
        assert_eq!(
            record.warnings()[0].flow().map(|f| f.as_str()),
            Some("charge")
        );
    }

    #[test]
    fn test_find_searches_descendants() {
        let mut parent = leaf("parent");
        parent.push_child(leaf("child"));
        assert!(parent.find("child").is_some());
        assert!(parent.find("missing").is_none());
    }

    #[test]
    fn test_find_returns_first_of_repeated_names() {
        let mut first = leaf("attempt");
        first.start();
        first.push_error(FlowException::technical("busy"));
        first.finish(StatusPolicy::AllSucceeded);
        let mut left = leaf("retry (1)");
        left.push_child(first);
        let mut right = leaf("retry (2)");
        right.push_child(leaf("attempt"));
        let mut root = leaf("fan");
        root.push_child(left);
        root.push_child(right);

        let found = root.find("attempt").map(|r| r.status());
        assert_eq!(found, Some(FlowStatus::Error));
        assert_eq!(
            root.children()[1].find("attempt").map(|r| r.status()),
            Some(FlowStatus::Ignored)
        );
    }

    #[test]
    fn test_composite_takes_yield_of_last_executed_child() {
        let mut empty = leaf("silent");
        empty.start();
        empty.mark_empty();
        empty.finish(StatusPolicy::AllSucceeded);
        let mut parent = leaf("cleanup");
        parent.start();
        parent.push_child(empty);
        parent.push_child(leaf("skipped"));
        parent.finish(StatusPolicy::AllSucceeded);
        assert!(!parent.yielded());

        let mut failed = leaf("failed");
        failed.start();
        failed.push_error(FlowException::technical("predicate failed"));
        let mut empty = leaf("silent");
        empty.start();
        empty.mark_empty();
        failed.push_child(empty);
        failed.finish(StatusPolicy::AnySucceeded);
        assert!(failed.yielded());
    }
}
