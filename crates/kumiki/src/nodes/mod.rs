//! Node types and their builders.
//!
//! Each builder is a plain configuration struct; `build()` validates that
//! every required field is present and returns an immutable [`Flow`].

mod conditional;
mod parallel;
mod recoverable;
mod retryable;
mod sequential;
mod step;
mod switch;

pub use conditional::ConditionalFlowBuilder;
pub use parallel::ParallelFlowBuilder;
pub use recoverable::RecoverableFlowBuilder;
pub use retryable::RetryableFlowBuilder;
pub use sequential::SequentialFlowBuilder;
pub use step::{FnStep, StepFlowBuilder};
pub use switch::SwitchFlowBuilder;

pub(crate) use conditional::ConditionalFlow;
pub(crate) use parallel::ParallelFlow;
pub(crate) use recoverable::RecoverableFlow;
pub(crate) use retryable::RetryableFlow;
pub(crate) use sequential::SequentialFlow;
pub(crate) use step::StepFlow;
pub(crate) use switch::SwitchFlow;

use crate::flow::Flow;
use crate::record::ExecutionRecord;
use kumiki_core::{FlowError, FlowName};

fn require_name(name: &FlowName) -> Result<(), FlowError> {
    if name.is_blank() {
        return Err(FlowError::MissingField {
            flow: name.to_string(),
            field: "name",
        });
    }
    Ok(())
}

fn require<T>(name: &FlowName, field: &'static str, value: Option<T>) -> Result<T, FlowError> {
    value.ok_or_else(|| FlowError::MissingField {
        flow: name.to_string(),
        field,
    })
}

/// Appends the record of the chosen child and ignored records for the rest,
/// keeping declaration order.
fn push_branches(
    record: &mut ExecutionRecord,
    branches: &[&Flow],
    chosen: Option<(usize, ExecutionRecord)>,
) {
    let mut chosen = chosen;
    for (index, branch) in branches.iter().enumerate() {
        match chosen.take() {
            Some((at, executed)) if at == index => record.push_child(executed),
            other => {
                chosen = other;
                record.push_child(ExecutionRecord::ignored(branch));
            }
        }
    }
}
