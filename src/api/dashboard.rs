//! Team overview: servers, billing totals and upcoming payments in one call.

use super::client::ApiClient;
use super::{billing, servers};
use crate::error::Result;
use crate::models::{Billing, BillingSummary, PaymentStatus, SelectedTeam, Server, ServerStatus};
use serde::Serialize;
use tracing::instrument;

/// Upcoming payments and servers shown on the overview
pub const OVERVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub team: SelectedTeam,
    pub servers: Vec<Server>,
    pub summary: BillingSummary,
    pub billings: Vec<Billing>,
}

impl Overview {
    pub fn online_servers(&self) -> usize {
        self.servers
            .iter()
            .filter(|s| s.status == Some(ServerStatus::Online))
            .count()
    }

    /// Pending or overdue payments, soonest first
    pub fn upcoming_payments(&self) -> Vec<&Billing> {
        let mut upcoming: Vec<&Billing> = self
            .billings
            .iter()
            .filter(|b| {
                matches!(
                    b.payment_status,
                    Some(PaymentStatus::Pending) | Some(PaymentStatus::Overdue)
                )
            })
            .collect();
        // Undated payments sort last
        upcoming.sort_by_key(|b| (b.next_payment_date.is_none(), b.next_payment_date));
        upcoming.truncate(OVERVIEW_LIMIT);
        upcoming
    }
}

/// The three team queries run concurrently through the same interceptor
#[instrument(skip(client), fields(team = %team.slug))]
pub async fn overview(client: &ApiClient, team: &SelectedTeam) -> Result<Overview> {
    let (servers, summary, billings) = tokio::try_join!(
        servers::team_servers(client, &team.id),
        billing::summary(client, Some(&team.id)),
        billing::team_billings(client, &team.id),
    )?;

    Ok(Overview {
        team: team.clone(),
        servers,
        summary,
        billings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};
    use serde_json::json;

    fn team() -> SelectedTeam {
        SelectedTeam {
            id: "t1".into(),
            name: "Ops".into(),
            slug: "ops".into(),
        }
    }

    #[tokio::test]
    async fn overview_combines_team_queries() {
        let transport = FakeTransport::new()
            .respond(
                "TeamServers",
                json!({ "teamServers": [
                    { "id": "s1", "name": "web", "host": "a", "status": "ONLINE" },
                    { "id": "s2", "name": "db", "host": "b", "status": "OFFLINE" }
                ]}),
            )
            .respond(
                "BillingSummary",
                json!({ "billingSummary": {
                    "totalMonthly": 50.0, "totalUpcoming": 20.0,
                    "upcomingPaymentsCount": 2, "overdueCount": 0, "overdueAmount": 0.0
                }}),
            )
            .respond(
                "TeamBillings",
                json!({ "teamBillings": [
                    { "id": "b1", "serviceName": "VPS", "amount": 10.0, "currency": "USD",
                      "nextPaymentDate": "2025-05-10T00:00:00Z", "paymentStatus": "PENDING" },
                    { "id": "b2", "serviceName": "CDN", "amount": 5.0, "currency": "USD",
                      "nextPaymentDate": "2025-05-01T00:00:00Z", "paymentStatus": "OVERDUE" },
                    { "id": "b3", "serviceName": "DNS", "amount": 1.0, "currency": "USD",
                      "nextPaymentDate": "2025-04-01T00:00:00Z", "paymentStatus": "PAID" }
                ]}),
            );
        let client = signed_in_client(transport.clone()).await;

        let overview = overview(&client, &team()).await.unwrap();
        assert_eq!(overview.online_servers(), 1);
        assert_eq!(overview.summary.total_monthly, 50.0);

        let upcoming: Vec<_> = overview
            .upcoming_payments()
            .into_iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(upcoming, ["b2", "b1"]);

        assert_eq!(transport.last("TeamBillings").unwrap().variables["teamId"], "t1");
    }
}
