//! Order processing flow with branching, fan-out and recovery.
//!
//! Demonstrates:
//! - Heterogeneous context storage
//! - Fan-out over the order lines with the line as metadata payload
//! - Switch dispatch on the payment method
//! - Falling back to a secondary carrier on technical failures
//! - A finally step that sees every error of the sequence

#![allow(dead_code)]

use async_trait::async_trait;
use kumiki::prelude::*;

#[derive(Debug, Clone)]
struct Order {
    id: String,
    lines: Vec<OrderLine>,
    payment_method: PaymentMethod,
    country: String,
}

#[derive(Debug, Clone)]
struct OrderLine {
    product_id: String,
    quantity: u32,
    price: f64,
}

#[derive(Debug, Clone, Copy)]
enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

#[derive(Debug)]
struct ReserveLine;

#[async_trait]
impl Step for ReserveLine {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        let Some(line) = metadata.payload::<OrderLine>() else {
            return Err("reserve step needs an order line".into());
        };
        println!("Reserving {} x {}", line.quantity, line.product_id);
        ctx.insert(format!("reserved:{}", line.product_id), line.quantity);
        if line.quantity > 5 {
            return Ok(StepOutcome::success_with_warnings(
                ctx,
                [FlowException::functional(format!(
                    "large quantity for {}",
                    line.product_id
                ))],
            ));
        }
        Ok(StepOutcome::success(ctx))
    }
}

#[derive(Debug)]
struct Charge(&'static str);

#[async_trait]
impl Step for Charge {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        _metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        let order = ctx.get::<Order>("order").ok_or("order missing")?;
        let total: f64 = order
            .lines
            .iter()
            .map(|line| line.price * line.quantity as f64)
            .sum();
        println!("Charging {:.2} via {}", total, self.0);
        ctx.insert("charged", total);
        Ok(StepOutcome::success(ctx))
    }
}

#[derive(Debug)]
struct Ship {
    carrier: &'static str,
    available: bool,
}

#[async_trait]
impl Step for Ship {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        _metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        if !self.available {
            return Err(format!("{} is not answering", self.carrier).into());
        }
        println!("Shipping with {}", self.carrier);
        ctx.insert("carrier", self.carrier.to_string());
        Ok(StepOutcome::success(ctx))
    }
}

#[derive(Debug)]
struct Summarize;

#[async_trait]
impl Step for Summarize {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        metadata: &Metadata,
    ) -> Result<StepOutcome, BoxError> {
        if metadata.has_errors() {
            println!("Order failed with {} error(s)", metadata.errors().len());
        } else {
            println!(
                "Order done with {} warning(s)",
                metadata.warnings().len()
            );
        }
        Ok(StepOutcome::success(ctx))
    }
}

fn step<S: Step + 'static>(name: &str, step: S) -> Result<Flow, FlowError> {
    Flow::step(name).step(step).build()
}

fn order_flow() -> Result<Flow, FlowError> {
    let reserve = Flow::parallel("reserve lines")
        .template(step("reserve", ReserveLine)?)
        .items(|ctx| {
            ctx.get::<Order>("order")
                .map(|order| order.lines.clone())
                .unwrap_or_default()
        })
        .build()?;

    let payment = Flow::switch("payment")
        .selector(|ctx| match ctx.get::<Order>("order").map(|o| o.payment_method) {
            Some(PaymentMethod::CreditCard) => "card",
            Some(PaymentMethod::BankTransfer) => "bank",
            None => "unknown",
        })
        .case("card", step("card", Charge("credit card"))?)
        .case("bank", step("bank", Charge("bank transfer"))?)
        .default(step("manual", Charge("manual review"))?)
        .build()?;

    let express = Flow::conditional("domestic?")
        .predicate(|ctx| {
            ctx.get::<Order>("order")
                .is_some_and(|order| order.country == "JP")
        })
        .when_true(step(
            "local courier",
            Ship {
                carrier: "local courier",
                available: true,
            },
        )?)
        .when_false(
            Flow::recoverable("international")
                .primary(step(
                    "air freight",
                    Ship {
                        carrier: "air freight",
                        available: false,
                    },
                )?)
                .fallback(step(
                    "sea freight",
                    Ship {
                        carrier: "sea freight",
                        available: true,
                    },
                )?)
                .recover_on(RecoverableSelector::Technical)
                .build()?,
        )
        .build()?;

    Flow::sequential("order")
        .then(reserve)
        .then(payment)
        .then(express)
        .finally(step("summarize", Summarize)?)
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let flow = order_flow()?;

    let ctx = ExecutionContext::new();
    ctx.insert(
        "order",
        Order {
            id: "ORD-001".to_string(),
            lines: vec![
                OrderLine {
                    product_id: "PROD-A".to_string(),
                    quantity: 2,
                    price: 29.99,
                },
                OrderLine {
                    product_id: "PROD-B".to_string(),
                    quantity: 8,
                    price: 4.5,
                },
            ],
            payment_method: PaymentMethod::CreditCard,
            country: "FR".to_string(),
        },
    );

    let report = flow.run(ctx).await;

    print!("{}", report.render_tree(RenderStyle::Colored));
    if let Some(carrier) = report.context().get::<String>("carrier") {
        println!("Carrier: {}", carrier);
    }
    println!("{}", report.to_json()?);

    // Same flow, concurrently, with a different order
    let other = ExecutionContext::new();
    other.insert(
        "order",
        Order {
            id: "ORD-002".to_string(),
            lines: Vec::new(),
            payment_method: PaymentMethod::BankTransfer,
            country: "JP".to_string(),
        },
    );
    let (first, second) = tokio::join!(flow.run(other), flow.run(ExecutionContext::new()));
    println!("ORD-002: {}, empty order: {}", first.status(), second.status());

    Ok(())
}
