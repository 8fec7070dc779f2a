use super::context::{confirm, Context};
use crate::api::servers::{self, Page, ProcessAction};
use crate::display::{self, Table};
use crate::error::{Error, Result};
use crate::models::{CheckType, LogLevel, Pm2Process, ServerInput, ServerLog};
use clap::{Args, Subcommand};
use std::time::Duration;
use tracing::debug;

/// How long to wait for the agent to answer over the socket
const AGENT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Subcommand)]
pub enum ServersCommand {
    /// Servers of the selected team
    #[command(visible_alias = "ls")]
    List {
        /// Every server you can see, not just the selected team's
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Server details and uptime
    Show {
        id: String,

        /// Uptime window: 24h, 7d or 30d
        #[arg(long, default_value = "24h")]
        period: String,

        #[arg(long)]
        json: bool,
    },

    /// Recent health checks
    Checks {
        id: String,

        #[command(flatten)]
        page: PageArgs,

        #[arg(long)]
        json: bool,
    },

    /// Stored agent logs
    Logs {
        id: String,

        #[command(flatten)]
        page: PageArgs,

        #[arg(long)]
        level: Option<LogLevel>,

        #[arg(long)]
        json: bool,
    },

    /// Stream new agent logs until interrupted
    WatchLogs {
        id: String,

        /// Ask the agent to send this many recent lines first
        #[arg(long)]
        lines: Option<u32>,
    },

    /// PM2 processes reported by the agent
    Processes {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Restart a PM2 process
    Restart(ProcessArgs),

    /// Stop a PM2 process
    Stop(ProcessArgs),

    /// Start a PM2 process
    Start(ProcessArgs),

    /// Enable or disable monitoring
    Toggle { id: String },

    /// Add a server to the selected team
    Create(CreateArgs),

    /// Issue a new agent token
    Token { id: String },

    /// Remove a server
    Delete {
        id: String,

        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct PageArgs {
    #[arg(long, default_value = "20")]
    pub limit: u32,

    #[arg(long)]
    pub offset: Option<u32>,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page {
            limit: Some(args.limit),
            offset: args.offset,
        }
    }
}

#[derive(Args)]
pub struct ProcessArgs {
    pub server_id: String,

    /// PM2 process id (`pm_id`)
    pub process_id: i64,

    /// Return without waiting for the agent's result
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub host: String,

    #[arg(long, default_value = "80")]
    pub port: u16,

    #[arg(long, default_value = "HTTP")]
    pub check_type: CheckType,

    /// Seconds between checks
    #[arg(long, default_value = "60")]
    pub interval: u32,

    #[arg(long)]
    pub http_path: Option<String>,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub monthly_price: Option<f64>,
}

pub async fn run(cmd: ServersCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: ServersCommand) -> Result<()> {
    let client = &ctx.client;

    match cmd {
        ServersCommand::List { all, json } => {
            let servers = if all {
                servers::list(client).await?
            } else {
                let team = ctx.team().await?;
                servers::team_servers(client, &team.id).await?
            };
            if json {
                return display::print_json(&servers);
            }
            let mut table = Table::new(&["ID", "NAME", "HOST", "STATUS", "UPTIME", "AGENT"]);
            for server in &servers {
                table.row(vec![
                    server.id.clone(),
                    server.name.clone(),
                    server.host.clone(),
                    display::server_status(server.status),
                    server
                        .uptime_percentage
                        .map(|u| format!("{:.1}%", u))
                        .unwrap_or_else(|| "-".into()),
                    if server.agent_connected { "connected" } else { "-" }.to_string(),
                ]);
            }
            table.print();
        }
        ServersCommand::Show { id, period, json } => {
            let (server, uptime) = tokio::try_join!(
                servers::get(client, &id),
                servers::uptime_stats(client, &id, Some(period.as_str())),
            )?;
            if json {
                return display::print_json(&serde_json::json!({ "server": server, "uptime": uptime }));
            }
            println!("{} {}", display::bold(&server.name), display::server_status(server.status));
            println!("  Host:      {}:{}", server.host, server.port.unwrap_or(80));
            if let Some(check) = server.check_type {
                println!("  Check:     {} every {}s", check, server.check_interval.unwrap_or(60));
            }
            println!("  Last seen: {}", display::date(server.last_online_at));
            println!(
                "  Uptime:    {:.2}% over {} ({} / {} checks, avg {:.0} ms)",
                uptime.uptime_percentage,
                period,
                uptime.successful_checks,
                uptime.total_checks,
                uptime.average_response_time
            );
            if let Some(metrics) = &server.agent_metrics {
                println!(
                    "  Agent:     cpu {:.1}%  mem {:.1}%  disk {:.1}%  processes {}/{}",
                    metrics.cpu_usage.unwrap_or_default(),
                    metrics.memory_usage.unwrap_or_default(),
                    metrics.disk_usage.unwrap_or_default(),
                    metrics.online_process_count.unwrap_or_default(),
                    metrics.process_count.unwrap_or_default()
                );
            }
        }
        ServersCommand::Checks { id, page, json } => {
            let checks = servers::checks(client, &id, page.into()).await?;
            if json {
                return display::print_json(&checks);
            }
            let mut table = Table::new(&["CHECKED", "STATUS", "TIME", "CODE", "ERROR"]);
            for check in &checks {
                table.row(vec![
                    display::timestamp(check.checked_at),
                    display::server_status(Some(check.status)),
                    check.response_time.map(|t| format!("{} ms", t)).unwrap_or_default(),
                    check.status_code.map(|c| c.to_string()).unwrap_or_default(),
                    check.error_message.clone().unwrap_or_default(),
                ]);
            }
            table.print();
        }
        ServersCommand::Logs { id, page, level, json } => {
            let logs = servers::logs(client, &id, page.into(), level).await?;
            if json {
                return display::print_json(&logs);
            }
            for log in &logs {
                print_log(log);
            }
        }
        ServersCommand::WatchLogs { id, lines } => {
            let mut logs = ctx.subscriptions().new_server_log(&id);
            if lines.is_some() {
                servers::request_logs(client, &id, lines).await?;
            }
            eprintln!("{}", display::muted("Watching logs, Ctrl-C to stop"));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = logs.next() => match event {
                        Some(Ok(log)) => print_log(&log),
                        Some(Err(e)) => return Err(e),
                        None => break,
                    },
                }
            }
        }
        ServersCommand::Processes { id, json } => {
            let mut updates = ctx.subscriptions().server_processes(&id);
            servers::request_processes(client, &id).await?;
            let snapshot = match tokio::time::timeout(AGENT_REPLY_TIMEOUT, updates.next()).await {
                Ok(Some(result)) => result?,
                Ok(None) | Err(_) => {
                    return Err(Error::WebSocket(
                        "agent did not report processes; is it connected?".to_string(),
                    ))
                }
            };
            if json {
                return display::print_json(&snapshot.processes);
            }
            print_processes(&snapshot.processes);
        }
        ServersCommand::Restart(args) => process(ctx, args, ProcessAction::Restart).await?,
        ServersCommand::Stop(args) => process(ctx, args, ProcessAction::Stop).await?,
        ServersCommand::Start(args) => process(ctx, args, ProcessAction::Start).await?,
        ServersCommand::Toggle { id } => {
            let server = servers::get(client, &id).await?;
            let toggled = servers::toggle(client, &id, !server.is_active).await?;
            println!(
                "Monitoring {} for {}",
                if toggled.is_active { "enabled" } else { "disabled" },
                server.name
            );
        }
        ServersCommand::Create(args) => {
            let team = ctx.team().await?;
            let server = servers::create(
                client,
                ServerInput {
                    team_id: Some(team.id),
                    server_id: None,
                    name: args.name,
                    host: args.host,
                    port: args.port,
                    check_type: args.check_type,
                    check_interval: args.interval,
                    http_path: args.http_path,
                    provider: args.provider,
                    monthly_price: args.monthly_price,
                },
            )
            .await?;
            println!("Created server {} ({})", server.name, server.id);
            if let Some(token) = &server.agent_token {
                println!("Agent token: {}", token);
            }
        }
        ServersCommand::Token { id } => {
            let token = servers::regenerate_agent_token(client, &id).await?;
            println!("{}", token.agent_token);
        }
        ServersCommand::Delete { id, yes } => {
            let server = servers::get(client, &id).await?;
            if !confirm(&format!("Delete server {}?", server.name), yes)? {
                return Ok(());
            }
            servers::delete(client, &id).await?;
            println!("Deleted server {}", server.name);
        }
    }
    Ok(())
}

/// Send a PM2 action and, unless told not to, wait for the agent's result
async fn process(ctx: &Context, args: ProcessArgs, action: ProcessAction) -> Result<()> {
    // Subscribe first so the result cannot arrive before we listen
    let mut results = (!args.no_wait).then(|| ctx.subscriptions().command_result(&args.server_id));

    let accepted =
        servers::process_action(&ctx.client, &args.server_id, args.process_id, action).await?;
    if !accepted {
        return Err(Error::Http {
            status: 409,
            message: format!("agent refused to {} process {}", action.as_str(), args.process_id),
        });
    }

    let Some(results) = results.as_mut() else {
        println!("Sent {} to process {}", action.as_str(), args.process_id);
        return Ok(());
    };

    let deadline = tokio::time::sleep(AGENT_REPLY_TIMEOUT);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => {
                println!("Sent {}; no result from agent yet", action.as_str());
                return Ok(());
            }
            event = results.next() => match event {
                Some(Ok(result)) if result.process_id.map_or(true, |id| id == args.process_id) => {
                    if result.success {
                        println!("{} {}: ok", action.as_str(), args.process_id);
                        if let Some(output) = result.output.filter(|o| !o.is_empty()) {
                            println!("{}", output);
                        }
                        return Ok(());
                    }
                    return Err(Error::Http {
                        status: 500,
                        message: result.error.unwrap_or_else(|| format!("{} failed", result.command)),
                    });
                }
                Some(Ok(other)) => debug!(process = ?other.process_id, "Ignoring result for another process"),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}

fn print_log(log: &ServerLog) {
    println!(
        "{} {:>5} {}{}",
        display::muted(&display::timestamp(log.timestamp)),
        display::log_level(log.level),
        log.source
            .as_deref()
            .map(|s| format!("[{}] ", s))
            .unwrap_or_default(),
        log.message
    );
}

fn print_processes(processes: &[Pm2Process]) {
    let mut table = Table::new(&["ID", "NAME", "STATUS", "CPU", "MEMORY", "RESTARTS"]);
    for process in processes {
        let env = process.pm2_env.as_ref();
        let monit = process.monit.as_ref();
        table.row(vec![
            process.pm_id.to_string(),
            process.name.clone(),
            display::process_status(env.and_then(|e| e.status.as_deref())),
            monit
                .and_then(|m| m.cpu)
                .map(|c| format!("{:.1}%", c))
                .unwrap_or_else(|| "-".into()),
            monit
                .and_then(|m| m.memory)
                .map(display::bytes)
                .unwrap_or_else(|| "-".into()),
            env.and_then(|e| e.restart_time)
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".into()),
        ]);
    }
    table.print();
}
