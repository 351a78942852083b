//! Post-run snapshot of a flow execution.

use crate::record::ExecutionRecord;
use kumiki_core::{ExecutionContext, FlowException, FlowStatus};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::time::Duration;

/// How [`Report`] renderings are decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    #[default]
    Plain,
    /// Statuses are wrapped in ANSI colour codes.
    Colored,
}

impl RenderStyle {
    fn status(self, status: FlowStatus) -> String {
        match self {
            RenderStyle::Plain => status.to_string(),
            RenderStyle::Colored => {
                let code = match status {
                    FlowStatus::Ignored => "90",
                    FlowStatus::Success => "32",
                    FlowStatus::Warning => "33",
                    FlowStatus::Error => "31",
                };
                format!("\x1b[{code}m{status}\x1b[0m")
            }
        }
    }
}

/// Result of [`Flow::run`](crate::Flow::run).
///
/// Holds the final context, the root execution record and the errors,
/// warnings and recovered errors of the whole tree, flattened depth-first.
#[derive(Debug, Clone)]
pub struct Report {
    context: ExecutionContext,
    root: ExecutionRecord,
    errors: Vec<FlowException>,
    warnings: Vec<FlowException>,
    recovered_errors: Vec<FlowException>,
}

#[derive(Serialize)]
struct ReportView<'a> {
    status: FlowStatus,
    duration_ms: u128,
    errors: &'a [FlowException],
    warnings: &'a [FlowException],
    recovered_errors: &'a [FlowException],
    tree: &'a ExecutionRecord,
}

impl Report {
    pub(crate) fn new(context: ExecutionContext, root: ExecutionRecord) -> Self {
        let errors = root.all_errors().into_iter().cloned().collect();
        let warnings = root.all_warnings().into_iter().cloned().collect();
        let recovered_errors = root.all_recovered_errors().into_iter().cloned().collect();
        Self {
            context,
            root,
            errors,
            warnings,
            recovered_errors,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Consumes the report, keeping only the context.
    pub fn into_context(self) -> ExecutionContext {
        self.context
    }

    pub fn root(&self) -> &ExecutionRecord {
        &self.root
    }

    pub fn status(&self) -> FlowStatus {
        self.root.status()
    }

    pub fn is_success(&self) -> bool {
        self.status().is_successful()
    }

    pub fn duration(&self) -> Duration {
        self.root.duration()
    }

    pub fn errors(&self) -> &[FlowException] {
        &self.errors
    }

    pub fn warnings(&self) -> &[FlowException] {
        &self.warnings
    }

    pub fn recovered_errors(&self) -> &[FlowException] {
        &self.recovered_errors
    }

    /// Finds the first record with the given name, depth-first.
    ///
    /// See [`ExecutionRecord::find`] for how repeated names are handled.
    pub fn find(&self, name: &str) -> Option<&ExecutionRecord> {
        self.root.find(name)
    }

    /// Serializes the status, exception lists and record tree as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ReportView {
            status: self.status(),
            duration_ms: self.duration().as_millis(),
            errors: &self.errors,
            warnings: &self.warnings,
            recovered_errors: &self.recovered_errors,
            tree: &self.root,
        })
    }

    /// Renders the record tree, one node per line, with each node's own
    /// exceptions listed under it.
    pub fn render_tree(&self, style: RenderStyle) -> String {
        let mut out = String::new();
        render_node(&mut out, &self.root, style, "", "", "");
        out
    }

    /// Renders every node on its own line in depth-first order, followed by
    /// the exception totals.
    pub fn render_flat(&self, style: RenderStyle) -> String {
        let mut out = String::new();
        let mut stack = vec![&self.root];
        while let Some(record) = stack.pop() {
            let _ = writeln!(
                out,
                "{} [{}] {} ({:?})",
                record.name(),
                record.kind(),
                style.status(record.status()),
                record.duration()
            );
            stack.extend(record.children().iter().rev());
        }
        let _ = writeln!(
            out,
            "errors: {}, warnings: {}, recovered: {}",
            self.errors.len(),
            self.warnings.len(),
            self.recovered_errors.len()
        );
        out
    }
}

fn render_node(
    out: &mut String,
    record: &ExecutionRecord,
    style: RenderStyle,
    prefix: &str,
    branch: &str,
    indent: &str,
) {
    let _ = write!(
        out,
        "{prefix}{branch}{} [{}] {}",
        record.name(),
        record.kind(),
        style.status(record.status())
    );
    if record.status() != FlowStatus::Ignored {
        let _ = write!(out, " ({:?})", record.duration());
    }
    out.push('\n');

    let child_prefix = format!("{prefix}{indent}");
    let notes = [
        ("error", record.errors()),
        ("warning", record.warnings()),
        ("recovered", record.recovered_errors()),
    ];
    for (label, exceptions) in notes {
        for exception in exceptions {
            let _ = writeln!(out, "{child_prefix}  {label}: {exception}");
        }
    }

    let count = record.children().len();
    for (index, child) in record.children().iter().enumerate() {
        let (branch, indent) = if index + 1 == count {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        render_node(out, child, style, &child_prefix, branch, indent);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_tree(RenderStyle::Plain))
    }
}
