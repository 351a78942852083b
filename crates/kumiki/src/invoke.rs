//! Call sites for user-supplied code.
//!
//! Everything a user hands to the engine (step bodies, predicates,
//! selectors, extractors, merge functions) is invoked through these guards
//! so that neither an `Err` nor a panic escapes a node.

use futures::FutureExt;
use kumiki_core::{BoxError, FlowException};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// Runs a synchronous callback.
pub(crate) fn guard<T>(call: impl FnOnce() -> Result<T, BoxError>) -> Result<T, FlowException> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(FlowException::from_raw(error)),
        Err(payload) => Err(panicked(payload)),
    }
}

/// Awaits an asynchronous callback.
pub(crate) async fn guard_async<T, F>(call: F) -> Result<T, FlowException>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(FlowException::from_raw(error)),
        Err(payload) => Err(panicked(payload)),
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> FlowException {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    FlowException::technical(format!("panicked: {detail}"))
}
