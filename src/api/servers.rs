//! Server monitoring queries, server mutations and PM2 process control.
//!
//! PM2 mutations only ask the agent to act; results arrive on the
//! `serverProcesses`, `serverLogsHistory` and `commandResult`
//! subscriptions in [`crate::api::subscriptions`].

use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{LogLevel, Server, ServerCheck, ServerInput, ServerLog, UptimeStats};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SERVERS: &str = r#"
query Servers {
  servers {
    id name host port checkType httpPath checkInterval status
    lastCheckAt lastOnlineAt agentConnected isActive uptimePercentage
    projectId provider monthlyPrice
    agentMetrics { cpuUsage memoryUsage processCount onlineProcessCount }
  }
}"#;

pub const SERVER: &str = r#"
query Server($id: ID!) {
  server(id: $id) {
    id name host port checkType httpPath checkInterval status
    lastCheckAt lastOnlineAt agentToken agentConnected isActive metadata
    projectId uptimePercentage provider monthlyPrice
    agentMetrics {
      cpuUsage memoryUsage diskUsage totalMemory freeMemory
      processCount onlineProcessCount
    }
  }
}"#;

pub const TEAM_SERVERS: &str = r#"
query TeamServers($teamId: ID!) {
  teamServers(teamId: $teamId) { id name host status lastCheckAt }
}"#;

pub const SERVER_CHECKS: &str = r#"
query ServerChecks($serverId: ID!, $limit: Int, $offset: Int) {
  serverChecks(serverId: $serverId, limit: $limit, offset: $offset) {
    id checkedAt status responseTime statusCode errorMessage
  }
}"#;

pub const SERVER_UPTIME_STATS: &str = r#"
query ServerUptimeStats($serverId: ID!, $period: String) {
  serverUptimeStats(serverId: $serverId, period: $period) {
    uptimePercentage totalChecks successfulChecks averageResponseTime downtime
  }
}"#;

pub const SERVER_LOGS: &str = r#"
query ServerLogs($serverId: ID!, $limit: Int, $offset: Int, $level: String) {
  serverLogs(serverId: $serverId, limit: $limit, offset: $offset, level: $level) {
    id timestamp level message source metadata
  }
}"#;

pub const CREATE_SERVER: &str = r#"
mutation CreateServer($input: CreateServerInput!) {
  createServer(input: $input) {
    id name host port checkType httpPath checkInterval status isActive
    projectId provider monthlyPrice
  }
}"#;

pub const UPDATE_SERVER: &str = r#"
mutation UpdateServer($input: UpdateServerInput!) {
  updateServer(input: $input) {
    id name host port checkType httpPath checkInterval isActive
    projectId provider monthlyPrice
  }
}"#;

pub const DELETE_SERVER: &str = r#"
mutation DeleteServer($serverId: ID!) {
  deleteServer(serverId: $serverId)
}"#;

pub const TOGGLE_SERVER: &str = r#"
mutation ToggleServer($serverId: ID!, $isActive: Boolean!) {
  toggleServer(serverId: $serverId, isActive: $isActive) { id isActive }
}"#;

pub const REGENERATE_AGENT_TOKEN: &str = r#"
mutation RegenerateAgentToken($serverId: ID!) {
  regenerateAgentToken(serverId: $serverId) { id agentToken }
}"#;

pub const REQUEST_SERVER_PROCESSES: &str = r#"
mutation RequestServerProcesses($serverId: ID!) {
  requestServerProcesses(serverId: $serverId)
}"#;

pub const REQUEST_SERVER_LOGS: &str = r#"
mutation RequestServerLogs($serverId: ID!, $lines: Int) {
  requestServerLogs(serverId: $serverId, lines: $lines)
}"#;

pub const RESTART_PROCESS: &str = r#"
mutation RestartProcess($serverId: ID!, $processId: Int!) {
  restartProcess(serverId: $serverId, processId: $processId)
}"#;

pub const STOP_PROCESS: &str = r#"
mutation StopProcess($serverId: ID!, $processId: Int!) {
  stopProcess(serverId: $serverId, processId: $processId)
}"#;

pub const START_PROCESS: &str = r#"
mutation StartProcess($serverId: ID!, $processId: Int!) {
  startProcess(serverId: $serverId, processId: $processId)
}"#;

/// Answer of `toggleServer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerToggle {
    pub id: String,
    pub is_active: bool,
}

/// Answer of `regenerateAgentToken`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentToken {
    pub id: String,
    pub agent_token: String,
}

/// Paging for check and log history
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// PM2 action on a single process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    Restart,
    Stop,
    Start,
}

impl ProcessAction {
    fn document(self) -> (&'static str, &'static str, &'static str) {
        match self {
            ProcessAction::Restart => (RESTART_PROCESS, "RestartProcess", "restartProcess"),
            ProcessAction::Stop => (STOP_PROCESS, "StopProcess", "stopProcess"),
            ProcessAction::Start => (START_PROCESS, "StartProcess", "startProcess"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessAction::Restart => "restart",
            ProcessAction::Stop => "stop",
            ProcessAction::Start => "start",
        }
    }
}

pub async fn list(client: &ApiClient) -> Result<Vec<Server>> {
    client.query(SERVERS, "Servers", json!({}), "servers").await
}

pub async fn get(client: &ApiClient, id: &str) -> Result<Server> {
    let server: Option<Server> = client
        .query(SERVER, "Server", json!({ "id": id }), "server")
        .await?;
    server.ok_or_else(|| Error::NotFound {
        what: format!("Server {}", id),
    })
}

pub async fn team_servers(client: &ApiClient, team_id: &str) -> Result<Vec<Server>> {
    client
        .query(
            TEAM_SERVERS,
            "TeamServers",
            json!({ "teamId": team_id }),
            "teamServers",
        )
        .await
}

pub async fn checks(client: &ApiClient, server_id: &str, page: Page) -> Result<Vec<ServerCheck>> {
    client
        .query(
            SERVER_CHECKS,
            "ServerChecks",
            json!({ "serverId": server_id, "limit": page.limit, "offset": page.offset }),
            "serverChecks",
        )
        .await
}

/// `period` is the API's window name, e.g. `24h`, `7d` or `30d`
pub async fn uptime_stats(
    client: &ApiClient,
    server_id: &str,
    period: Option<&str>,
) -> Result<UptimeStats> {
    client
        .query(
            SERVER_UPTIME_STATS,
            "ServerUptimeStats",
            json!({ "serverId": server_id, "period": period }),
            "serverUptimeStats",
        )
        .await
}

pub async fn logs(
    client: &ApiClient,
    server_id: &str,
    page: Page,
    level: Option<LogLevel>,
) -> Result<Vec<ServerLog>> {
    client
        .query(
            SERVER_LOGS,
            "ServerLogs",
            json!({
                "serverId": server_id,
                "limit": page.limit,
                "offset": page.offset,
                "level": level.map(|l| l.as_str()),
            }),
            "serverLogs",
        )
        .await
}

pub async fn create(client: &ApiClient, input: ServerInput) -> Result<Server> {
    validate(&input)?;
    client
        .query(
            CREATE_SERVER,
            "CreateServer",
            json!({ "input": input.normalized() }),
            "createServer",
        )
        .await
}

pub async fn update(client: &ApiClient, input: ServerInput) -> Result<Server> {
    if input.server_id.is_none() {
        return Err(Error::validation("serverId", "required for update"));
    }
    validate(&input)?;
    client
        .query(
            UPDATE_SERVER,
            "UpdateServer",
            json!({ "input": input.normalized() }),
            "updateServer",
        )
        .await
}

fn validate(input: &ServerInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    if input.host.trim().is_empty() {
        return Err(Error::validation("host", "must not be empty"));
    }
    if input.port == 0 {
        return Err(Error::validation("port", "must be between 1 and 65535"));
    }
    if input.check_interval == 0 {
        return Err(Error::validation("checkInterval", "must be at least one second"));
    }
    Ok(())
}

pub async fn delete(client: &ApiClient, server_id: &str) -> Result<bool> {
    client
        .query(
            DELETE_SERVER,
            "DeleteServer",
            json!({ "serverId": server_id }),
            "deleteServer",
        )
        .await
}

pub async fn toggle(client: &ApiClient, server_id: &str, is_active: bool) -> Result<ServerToggle> {
    client
        .query(
            TOGGLE_SERVER,
            "ToggleServer",
            json!({ "serverId": server_id, "isActive": is_active }),
            "toggleServer",
        )
        .await
}

pub async fn regenerate_agent_token(client: &ApiClient, server_id: &str) -> Result<AgentToken> {
    client
        .query(
            REGENERATE_AGENT_TOKEN,
            "RegenerateAgentToken",
            json!({ "serverId": server_id }),
            "regenerateAgentToken",
        )
        .await
}

/// Ask the agent to publish its PM2 process list
pub async fn request_processes(client: &ApiClient, server_id: &str) -> Result<bool> {
    client
        .query(
            REQUEST_SERVER_PROCESSES,
            "RequestServerProcesses",
            json!({ "serverId": server_id }),
            "requestServerProcesses",
        )
        .await
}

/// Ask the agent to publish the last `lines` PM2 log lines
pub async fn request_logs(client: &ApiClient, server_id: &str, lines: Option<u32>) -> Result<bool> {
    client
        .query(
            REQUEST_SERVER_LOGS,
            "RequestServerLogs",
            json!({ "serverId": server_id, "lines": lines }),
            "requestServerLogs",
        )
        .await
}

pub async fn process_action(
    client: &ApiClient,
    server_id: &str,
    process_id: i64,
    action: ProcessAction,
) -> Result<bool> {
    let (document, operation, field) = action.document();
    client
        .query(
            document,
            operation,
            json!({ "serverId": server_id, "processId": process_id }),
            field,
        )
        .await
}

pub async fn restart_process(client: &ApiClient, server_id: &str, process_id: i64) -> Result<bool> {
    process_action(client, server_id, process_id, ProcessAction::Restart).await
}

pub async fn stop_process(client: &ApiClient, server_id: &str, process_id: i64) -> Result<bool> {
    process_action(client, server_id, process_id, ProcessAction::Stop).await
}

pub async fn start_process(client: &ApiClient, server_id: &str, process_id: i64) -> Result<bool> {
    process_action(client, server_id, process_id, ProcessAction::Start).await
}
