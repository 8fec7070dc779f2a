pub mod account;
pub mod attachments;
pub mod billing;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod logs;
pub mod projects;
pub mod servers;
pub mod tasks;
pub mod team;

pub use context::Context;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "opsdeck")]
#[command(about = "Servers, PM2 processes, projects, billing and kanban from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging to terminal
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Override config directory (for testing)
    #[arg(long, global = true)]
    pub config_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(account::LoginArgs),

    /// Create an account and sign in
    Register(account::RegisterArgs),

    /// Sign out and forget the local session
    Logout,

    /// Show the signed-in user
    Whoami(account::WhoamiArgs),

    /// List, select and manage teams
    #[command(subcommand)]
    Team(team::TeamCommand),

    /// Monitored servers and their PM2 processes
    #[command(subcommand, visible_alias = "srv")]
    Servers(servers::ServersCommand),

    /// Projects and their billing
    #[command(subcommand)]
    Projects(projects::ProjectsCommand),

    /// Server billing and payments
    #[command(subcommand)]
    Billing(billing::BillingCommand),

    /// Kanban tasks, columns and comments
    #[command(subcommand)]
    Tasks(tasks::TasksCommand),

    /// Files attached to tasks
    #[command(subcommand, visible_alias = "att")]
    Attachments(attachments::AttachmentsCommand),

    /// Overview of the selected team
    #[command(visible_alias = "dash")]
    Dashboard(dashboard::DashboardArgs),

    /// View the client's own log files
    Logs(logs::LogsArgs),

    /// Show, locate or edit the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommand),

    /// Generate shell completion script
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login(args) => account::login(args).await.map_err(Into::into),
        Commands::Register(args) => account::register(args).await.map_err(Into::into),
        Commands::Logout => account::logout().await.map_err(Into::into),
        Commands::Whoami(args) => account::whoami(args).await.map_err(Into::into),
        Commands::Team(cmd) => team::run(cmd).await.map_err(Into::into),
        Commands::Servers(cmd) => servers::run(cmd).await.map_err(Into::into),
        Commands::Projects(cmd) => projects::run(cmd).await.map_err(Into::into),
        Commands::Billing(cmd) => billing::run(cmd).await.map_err(Into::into),
        Commands::Tasks(cmd) => tasks::run(cmd).await.map_err(Into::into),
        Commands::Attachments(cmd) => attachments::run(cmd).await.map_err(Into::into),
        Commands::Dashboard(args) => dashboard::run(args).await.map_err(Into::into),
        Commands::Logs(args) => logs::run(args).await.map_err(Into::into),
        Commands::Config(cmd) => config::run(cmd).await.map_err(Into::into),
        Commands::Completions { shell } => generate_completions(shell),
    }
}

/// Generate shell completions
pub fn generate_completions(shell: clap_complete::Shell) -> Result<()> {
    use clap::CommandFactory;
    use std::io;
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "opsdeck", &mut io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "opsdeck", "tasks", "move", "t1", "--column", "c2", "--position", "2",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Tasks(_)));

        let cli = Cli::try_parse_from(["opsdeck", "--verbose", "team", "use"]).unwrap();
        assert!(cli.verbose);
    }
}
