use super::billing::service_name;
use super::context::Context;
use crate::api::dashboard::{self, Overview};
use crate::display::{self, Table};
use crate::error::Result;
use clap::Args;

#[derive(Args)]
pub struct DashboardArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: DashboardArgs) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = async {
        let team = ctx.team().await?;
        dashboard::overview(&ctx.client, &team).await
    }
    .await;
    let overview = ctx.settle(result).await?;

    if args.json {
        return display::print_json(&overview);
    }
    print_overview(&overview);
    Ok(())
}

fn print_overview(overview: &Overview) {
    println!("{}", display::bold(&overview.team.name));
    println!();

    println!(
        "{} {}/{} online",
        display::bold("Servers"),
        overview.online_servers(),
        overview.servers.len()
    );
    let mut servers = Table::new(&["NAME", "HOST", "STATUS"]);
    for server in overview.servers.iter().take(dashboard::OVERVIEW_LIMIT) {
        servers.row(vec![
            server.name.clone(),
            server.host.clone(),
            display::server_status(server.status),
        ]);
    }
    if !servers.is_empty() {
        servers.print();
    }
    println!();

    let summary = &overview.summary;
    println!("{}", display::bold("Billing"));
    println!("  Monthly total: {:.2}", summary.total_monthly);
    println!(
        "  Upcoming:      {:.2} ({} payments)",
        summary.total_upcoming, summary.upcoming_payments_count
    );
    if summary.overdue_count > 0 {
        println!(
            "  Overdue:       {:.2} ({} payments)",
            summary.overdue_amount, summary.overdue_count
        );
    }

    let upcoming = overview.upcoming_payments();
    if upcoming.is_empty() {
        return;
    }
    println!();
    println!("{}", display::bold("Upcoming payments"));
    let mut table = Table::new(&["SERVICE", "AMOUNT", "DUE", "STATUS"]);
    for billing in upcoming {
        table.row(vec![
            service_name(billing),
            display::money(billing.amount, &billing.currency),
            display::date(billing.next_payment_date),
            display::payment_status(billing.payment_status),
        ]);
    }
    table.print();
}
