use super::context::{confirm, Context};
use crate::api::projects;
use crate::display::{self, Table};
use crate::error::Result;
use crate::models::{ProjectBillingInput, ProjectInput, RecordProjectPaymentInput};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum ProjectsCommand {
    #[command(visible_alias = "ls")]
    List {
        #[arg(long)]
        json: bool,
    },

    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Projects with their billing status
    Billing {
        #[arg(long)]
        json: bool,
    },

    /// Payment history of one project, or of all projects
    History {
        id: Option<String>,

        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        json: bool,
    },

    /// Record a payment for a project
    Pay(PayArgs),

    /// Set provider, cost or next payment date
    SetBilling(SetBillingArgs),

    Create(CreateArgs),

    Archive { id: String },

    Delete {
        id: String,

        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct PayArgs {
    pub id: String,

    pub amount: f64,

    /// Payment date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct SetBillingArgs {
    pub id: String,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub monthly_cost: Option<f64>,

    #[arg(long)]
    pub currency: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub next_payment: Option<NaiveDate>,
}

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub monthly_cost: Option<f64>,

    #[arg(long)]
    pub currency: Option<String>,
}

/// Midnight UTC of a calendar date
pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub async fn run(cmd: ProjectsCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: ProjectsCommand) -> Result<()> {
    let client = &ctx.client;

    match cmd {
        ProjectsCommand::List { json } => {
            let projects = projects::list(client).await?;
            if json {
                return display::print_json(&projects);
            }
            let mut table = Table::new(&["ID", "NAME", "PROVIDER", "MONTHLY", "NEXT PAYMENT", ""]);
            for project in &projects {
                table.row(vec![
                    project.id.clone(),
                    project.name.clone(),
                    project.provider.clone().unwrap_or_default(),
                    project
                        .monthly_cost
                        .map(|c| display::money(c, project.currency.as_deref().unwrap_or("USD")))
                        .unwrap_or_default(),
                    display::date(project.next_payment_date),
                    if project.is_active { String::new() } else { display::muted("archived") },
                ]);
            }
            table.print();
        }
        ProjectsCommand::Show { id, json } => {
            let project = projects::get(client, &id).await?;
            if json {
                return display::print_json(&project);
            }
            println!("{}", display::bold(&project.name));
            if let Some(description) = &project.description {
                println!("  {}", description);
            }
            println!("  Provider:     {}", project.provider.as_deref().unwrap_or("-"));
            if let Some(cost) = project.monthly_cost {
                println!(
                    "  Monthly:      {}",
                    display::money(cost, project.currency.as_deref().unwrap_or("USD"))
                );
            }
            println!("  Next payment: {}", display::date(project.next_payment_date));
            println!("  Last payment: {}", display::date(project.last_payment_date));
        }
        ProjectsCommand::Billing { json } => {
            let projects = projects::with_billing(client).await?;
            if json {
                return display::print_json(&projects);
            }
            let mut table = Table::new(&["NAME", "MONTHLY", "NEXT PAYMENT", "DUE"]);
            for project in &projects {
                let due = match project.days_until_payment {
                    _ if project.is_overdue => display::payment_status(Some(crate::models::PaymentStatus::Overdue)),
                    Some(days) => format!("in {} days", days),
                    None => "-".to_string(),
                };
                table.row(vec![
                    project.name.clone(),
                    project
                        .monthly_cost
                        .map(|c| display::money(c, project.currency.as_deref().unwrap_or("USD")))
                        .unwrap_or_default(),
                    display::date(project.next_payment_date),
                    due,
                ]);
            }
            table.print();
        }
        ProjectsCommand::History { id, limit, json } => {
            let payments = match &id {
                Some(id) => projects::payment_history(client, id).await?,
                None => projects::all_payment_history(client, Some(limit)).await?,
            };
            if json {
                return display::print_json(&payments);
            }
            let mut table = Table::new(&["DATE", "PROJECT", "AMOUNT", "MONTHS", "NOTE"]);
            for payment in &payments {
                table.row(vec![
                    display::date(Some(payment.payment_date)),
                    payment
                        .project
                        .as_ref()
                        .map(|p| p.name.clone())
                        .or_else(|| payment.project_id.clone())
                        .unwrap_or_default(),
                    format!("{:.2}", payment.amount),
                    payment.months_covered.map(|m| m.to_string()).unwrap_or_default(),
                    payment.note.clone().unwrap_or_default(),
                ]);
            }
            table.print();
        }
        ProjectsCommand::Pay(args) => {
            let payment_date = args.date.map(day_start).unwrap_or_else(Utc::now);
            let payment = projects::record_payment(
                client,
                RecordProjectPaymentInput {
                    project_id: args.id,
                    amount: args.amount,
                    payment_date,
                    note: args.note,
                },
            )
            .await?;
            println!(
                "Recorded payment of {:.2} on {}",
                payment.amount,
                display::date(Some(payment.payment_date))
            );
        }
        ProjectsCommand::SetBilling(args) => {
            let project = projects::update_billing(
                client,
                ProjectBillingInput {
                    project_id: args.id,
                    provider: args.provider,
                    monthly_cost: args.monthly_cost,
                    currency: args.currency,
                    next_payment_date: args.next_payment.map(day_start),
                },
            )
            .await?;
            println!("Updated billing for {}", project.name);
        }
        ProjectsCommand::Create(args) => {
            let team = ctx.team().await?;
            let project = projects::create(
                client,
                ProjectInput {
                    team_id: Some(team.id),
                    name: args.name,
                    description: args.description,
                    color: args.color,
                    provider: args.provider,
                    monthly_cost: args.monthly_cost,
                    currency: args.currency,
                    ..Default::default()
                },
            )
            .await?;
            println!("Created project {} ({})", project.name, project.id);
        }
        ProjectsCommand::Archive { id } => {
            let project = projects::archive(client, &id).await?;
            println!("Archived {}", project.name);
        }
        ProjectsCommand::Delete { id, yes } => {
            let project = projects::get(client, &id).await?;
            if !confirm(&format!("Delete project {}?", project.name), yes)? {
                return Ok(());
            }
            projects::delete(client, &id).await?;
            println!("Deleted project {}", project.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_start_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(day_start(date).to_rfc3339(), "2025-03-01T00:00:00+00:00");
    }
}
