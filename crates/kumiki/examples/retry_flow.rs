//! Retrying a flaky step with exponential backoff.

use async_trait::async_trait;
use kumiki::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct FlakyApiCall {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Step for FlakyApiCall {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        _metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Calling API, attempt {}", attempt);
        tokio::time::sleep(Duration::from_millis(20)).await;

        if attempt < 3 {
            return Ok(StepOutcome::error(
                ctx,
                [FlowException::technical("503 service unavailable")],
            ));
        }
        ctx.insert("response", format!("ok after {} attempts", attempt));
        Ok(StepOutcome::success(ctx))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let attempts = Arc::new(AtomicU32::new(0));
    let call = Flow::step("api call")
        .step(FlakyApiCall {
            attempts: Arc::clone(&attempts),
        })
        .timeout(Duration::from_secs(1))
        .build()?;

    let flow = Flow::retryable("api with retry")
        .flow(call)
        .retry_on(RecoverableSelector::Technical)
        .policy(RetryPolicy::exponential_backoff(
            4,
            Duration::from_millis(50),
            Duration::from_millis(400),
            2,
        )?)
        .build()?;

    let report = flow.run(ExecutionContext::new()).await;

    print!("{}", report.render_flat(RenderStyle::Colored));
    for recovered in report.recovered_errors() {
        println!("Recovered: {}", recovered);
    }
    if let Some(response) = report.context().get::<String>("response") {
        println!("Response: {}", response);
    }

    Ok(())
}
