use super::context::Context;
use crate::api::billing;
use crate::display::{self, Table};
use crate::error::Result;
use crate::models::{Billing, RecordPaymentInput};
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum BillingCommand {
    /// Billings of the selected team
    #[command(visible_alias = "ls")]
    List {
        /// Every billing visible to you, not only the team's
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Monthly totals and overdue amounts
    Summary {
        #[arg(long)]
        json: bool,
    },

    /// Payments recorded against a billing
    History {
        billing_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Record a payment
    Pay(PayArgs),
}

#[derive(Args)]
pub struct PayArgs {
    pub billing_id: String,

    pub amount: f64,

    #[arg(long, default_value = "USD")]
    pub currency: String,

    #[arg(long)]
    pub transaction_id: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

pub(crate) fn service_name(billing: &Billing) -> String {
    billing
        .service_name
        .clone()
        .or_else(|| billing.server.as_ref().map(|s| s.name.clone()))
        .unwrap_or_else(|| billing.id.clone())
}

pub async fn run(cmd: BillingCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: BillingCommand) -> Result<()> {
    let client = &ctx.client;

    match cmd {
        BillingCommand::List { all, json } => {
            let billings = if all {
                billing::list(client).await?
            } else {
                let team = ctx.team().await?;
                billing::team_billings(client, &team.id).await?
            };
            if json {
                return display::print_json(&billings);
            }
            let mut table = Table::new(&["ID", "SERVICE", "AMOUNT", "CYCLE", "NEXT PAYMENT", "STATUS"]);
            for b in &billings {
                table.row(vec![
                    b.id.clone(),
                    service_name(b),
                    display::money(b.amount, &b.currency),
                    b.billing_cycle.map(|c| c.to_string()).unwrap_or_default(),
                    display::date(b.next_payment_date),
                    display::payment_status(b.payment_status),
                ]);
            }
            if table.is_empty() {
                println!("No billings");
            } else {
                table.print();
            }
        }
        BillingCommand::Summary { json } => {
            let team = ctx.team().await?;
            let summary = billing::summary(client, Some(&team.id)).await?;
            if json {
                return display::print_json(&summary);
            }
            println!("{}", display::bold(&format!("Billing for {}", team.name)));
            println!("  Monthly total:     {:.2}", summary.total_monthly);
            println!(
                "  Upcoming:          {:.2} ({} payments)",
                summary.total_upcoming, summary.upcoming_payments_count
            );
            if summary.overdue_count > 0 {
                println!(
                    "  Overdue:           {:.2} ({} payments)",
                    summary.overdue_amount, summary.overdue_count
                );
            }
        }
        BillingCommand::History { billing_id, json } => {
            let payments = billing::payment_history(client, &billing_id).await?;
            if json {
                return display::print_json(&payments);
            }
            let mut table = Table::new(&["DATE", "AMOUNT", "STATUS", "TRANSACTION", "NOTES"]);
            for p in &payments {
                table.row(vec![
                    display::date(Some(p.payment_date)),
                    display::money(p.amount, &p.currency),
                    display::payment_status(Some(p.status)),
                    p.transaction_id.clone().unwrap_or_default(),
                    p.notes.clone().unwrap_or_default(),
                ]);
            }
            table.print();
        }
        BillingCommand::Pay(args) => {
            let payment = billing::record_payment(
                client,
                RecordPaymentInput {
                    billing_id: args.billing_id,
                    amount: args.amount,
                    currency: args.currency,
                    transaction_id: args.transaction_id,
                    notes: args.notes,
                },
            )
            .await?;
            println!(
                "Recorded {} on {}",
                display::money(payment.amount, &payment.currency),
                display::date(Some(payment.payment_date))
            );
        }
    }
    Ok(())
}
