//! Simple sequential flow example.

use async_trait::async_trait;
use kumiki::prelude::*;

#[derive(Debug)]
struct DataLoadStep;

#[async_trait]
impl Step for DataLoadStep {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        _metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        println!("Loading data...");
        ctx.insert("data", "sample data".to_string());
        Ok(StepOutcome::success(ctx))
    }
}

#[derive(Debug)]
struct DataPrintStep;

#[async_trait]
impl Step for DataPrintStep {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        _metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        match ctx.get::<String>("data") {
            Some(data) => {
                println!("Data: {}", data);
                Ok(StepOutcome::success(ctx))
            }
            None => Ok(StepOutcome::error(
                ctx,
                [FlowException::functional("nothing was loaded")],
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let flow = Flow::sequential("load and print")
        .then(Flow::step("load").step(DataLoadStep).build()?)
        .then(Flow::step("print").step(DataPrintStep).build()?)
        .build()?;

    let report = flow.run(ExecutionContext::new()).await;

    if report.is_success() {
        println!("Flow completed successfully in {:?}", report.duration());
    } else {
        for error in report.errors() {
            eprintln!("Flow failed: {}", error);
        }
    }
    print!("{}", report);

    Ok(())
}
