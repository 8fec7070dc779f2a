use super::enums::{CheckType, LogLevel, ServerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub check_type: Option<CheckType>,
    pub http_path: Option<String>,
    pub check_interval: Option<u32>,
    pub status: Option<ServerStatus>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_online_at: Option<DateTime<Utc>>,
    pub agent_token: Option<String>,
    #[serde(default)]
    pub agent_connected: bool,
    #[serde(default)]
    pub is_active: bool,
    pub metadata: Option<serde_json::Value>,
    pub project_id: Option<String>,
    pub uptime_percentage: Option<f64>,
    pub provider: Option<String>,
    pub monthly_price: Option<f64>,
    pub agent_metrics: Option<AgentMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub total_memory: Option<f64>,
    pub free_memory: Option<f64>,
    pub process_count: Option<u32>,
    pub online_process_count: Option<u32>,
}

/// The `{ id name host }` slice of a server embedded in billings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRef {
    pub id: String,
    pub name: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCheck {
    pub id: String,
    pub checked_at: DateTime<Utc>,
    pub status: ServerStatus,
    pub response_time: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeStats {
    pub uptime_percentage: f64,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub average_response_time: f64,
    pub downtime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub source: Option<String>,
    pub server_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A PM2 process as reported by the agent (snake_case on the wire)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pm2Process {
    pub pm_id: i64,
    pub name: String,
    pub pid: Option<i64>,
    pub pm2_env: Option<Pm2Env>,
    pub monit: Option<Pm2Monit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pm2Env {
    pub status: Option<String>,
    pub pm_uptime: Option<i64>,
    pub restart_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pm2Monit {
    pub cpu: Option<f64>,
    pub memory: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProcesses {
    pub server_id: String,
    pub processes: Vec<Pm2Process>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLogsHistory {
    pub server_id: String,
    pub logs: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub server_id: String,
    pub success: bool,
    pub command: String,
    pub process_id: Option<i64>,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub check_type: CheckType,
    pub check_interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_price: Option<f64>,
}

impl ServerInput {
    /// `httpPath` is only meaningful for HTTP checks
    pub fn normalized(mut self) -> Self {
        if self.check_type != CheckType::Http {
            self.http_path = None;
        }
        self
    }
}
