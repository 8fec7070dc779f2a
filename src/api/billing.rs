//! Recurring server billing.

use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{Billing, BillingInput, BillingSummary, PaymentHistory, RecordPaymentInput};
use serde_json::json;

pub const BILLINGS: &str = r#"
query Billings {
  billings {
    id amount currency billingCycle nextPaymentDate paymentStatus
    accountId notes remindDaysBefore
    server { id name host }
  }
}"#;

pub const SERVER_BILLING: &str = r#"
query ServerBilling($serverId: ID!) {
  serverBilling(serverId: $serverId) {
    id amount currency billingCycle nextPaymentDate paymentStatus
    accountId notes remindDaysBefore
    server { id name host }
  }
}"#;

pub const BILLING_SUMMARY: &str = r#"
query BillingSummary {
  billingSummary {
    totalMonthly totalUpcoming upcomingPaymentsCount overdueCount overdueAmount
  }
}"#;

pub const TEAM_BILLING_SUMMARY: &str = r#"
query BillingSummary($teamId: ID!) {
  billingSummary(teamId: $teamId) {
    totalMonthly totalUpcoming upcomingPaymentsCount overdueCount overdueAmount
  }
}"#;

pub const TEAM_BILLINGS: &str = r#"
query TeamBillings($teamId: ID!) {
  teamBillings(teamId: $teamId) {
    id serviceName amount currency nextPaymentDate paymentStatus
  }
}"#;

pub const PAYMENT_HISTORY: &str = r#"
query PaymentHistory($billingId: ID!) {
  paymentHistory(billingId: $billingId) {
    id amount currency paymentDate status transactionId notes createdAt
  }
}"#;

pub const CREATE_BILLING: &str = r#"
mutation CreateBilling($input: CreateBillingInput!) {
  createBilling(input: $input) {
    id amount currency billingCycle nextPaymentDate paymentStatus
  }
}"#;

pub const UPDATE_BILLING: &str = r#"
mutation UpdateBilling($input: UpdateBillingInput!) {
  updateBilling(input: $input) {
    id amount currency billingCycle nextPaymentDate paymentStatus
  }
}"#;

pub const DELETE_BILLING: &str = r#"
mutation DeleteBilling($billingId: ID!) {
  deleteBilling(billingId: $billingId)
}"#;

pub const RECORD_PAYMENT: &str = r#"
mutation RecordPayment($input: RecordPaymentInput!) {
  recordPayment(input: $input) {
    id amount currency paymentDate status transactionId notes
  }
}"#;

pub async fn list(client: &ApiClient) -> Result<Vec<Billing>> {
    client.query(BILLINGS, "Billings", json!({}), "billings").await
}

/// `None` when the server has no billing configured
pub async fn server_billing(client: &ApiClient, server_id: &str) -> Result<Option<Billing>> {
    client
        .query(
            SERVER_BILLING,
            "ServerBilling",
            json!({ "serverId": server_id }),
            "serverBilling",
        )
        .await
}

/// Totals for one team, or for everything the user can see
pub async fn summary(client: &ApiClient, team_id: Option<&str>) -> Result<BillingSummary> {
    match team_id {
        Some(team_id) => {
            client
                .query(
                    TEAM_BILLING_SUMMARY,
                    "BillingSummary",
                    json!({ "teamId": team_id }),
                    "billingSummary",
                )
                .await
        }
        None => {
            client
                .query(BILLING_SUMMARY, "BillingSummary", json!({}), "billingSummary")
                .await
        }
    }
}

pub async fn team_billings(client: &ApiClient, team_id: &str) -> Result<Vec<Billing>> {
    client
        .query(
            TEAM_BILLINGS,
            "TeamBillings",
            json!({ "teamId": team_id }),
            "teamBillings",
        )
        .await
}

pub async fn payment_history(client: &ApiClient, billing_id: &str) -> Result<Vec<PaymentHistory>> {
    client
        .query(
            PAYMENT_HISTORY,
            "PaymentHistory",
            json!({ "billingId": billing_id }),
            "paymentHistory",
        )
        .await
}

pub async fn create(client: &ApiClient, input: BillingInput) -> Result<Billing> {
    if input.server_id.is_none() {
        return Err(Error::validation("serverId", "required to create a billing"));
    }
    validate_amount(input.amount)?;
    client
        .query(
            CREATE_BILLING,
            "CreateBilling",
            json!({ "input": input }),
            "createBilling",
        )
        .await
}

pub async fn update(client: &ApiClient, input: BillingInput) -> Result<Billing> {
    if input.billing_id.is_none() {
        return Err(Error::validation("billingId", "required for update"));
    }
    validate_amount(input.amount)?;
    client
        .query(
            UPDATE_BILLING,
            "UpdateBilling",
            json!({ "input": input }),
            "updateBilling",
        )
        .await
}

pub async fn delete(client: &ApiClient, billing_id: &str) -> Result<bool> {
    client
        .query(
            DELETE_BILLING,
            "DeleteBilling",
            json!({ "billingId": billing_id }),
            "deleteBilling",
        )
        .await
}

pub async fn record_payment(client: &ApiClient, input: RecordPaymentInput) -> Result<PaymentHistory> {
    validate_amount(input.amount)?;
    client
        .query(
            RECORD_PAYMENT,
            "RecordPayment",
            json!({ "input": input }),
            "recordPayment",
        )
        .await
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::validation("amount", "must be greater than zero"));
    }
    Ok(())
}
