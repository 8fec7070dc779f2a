use super::enums::{BillingCycle, PaymentStatus};
use super::server::ServerRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: Option<BillingCycle>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentStatus>,
    pub provider: Option<String>,
    pub service_name: Option<String>,
    pub account_id: Option<String>,
    pub notes: Option<String>,
    pub remind_days_before: Option<u32>,
    pub server: Option<ServerRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub total_monthly: f64,
    pub total_upcoming: f64,
    pub upcoming_payments_count: u32,
    pub overdue_count: u32,
    pub overdue_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<BillingCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentInput {
    pub billing_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
