use super::context::{prompt, Context};
use crate::display;
use crate::error::Result;
use clap::Args;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long, short)]
    pub email: Option<String>,

    /// Password (prompted when omitted)
    #[arg(long, env = "OPSDECK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long, short)]
    pub name: Option<String>,

    #[arg(long, short)]
    pub email: Option<String>,

    /// At least 8 characters (prompted when omitted)
    #[arg(long, env = "OPSDECK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct WhoamiArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let ctx = Context::load().await?;
    let email = value_or_prompt(args.email, "Email: ")?;
    let password = value_or_prompt(args.password, "Password: ")?;

    let profile = ctx.auth().login(&email, &password).await?;
    println!("Signed in as {} <{}>", display::bold(&profile.name), profile.email);

    // Reconciles the stored selection with the new user's teams
    match ctx.teams().list().await {
        Ok(_) => {
            if let Some(current) = ctx.teams().current().await? {
                println!("Team: {} ({})", current.name, current.slug);
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not load teams after login"),
    }
    Ok(())
}

pub async fn register(args: RegisterArgs) -> Result<()> {
    let ctx = Context::load().await?;
    let name = value_or_prompt(args.name, "Name: ")?;
    let email = value_or_prompt(args.email, "Email: ")?;
    let password = value_or_prompt(args.password, "Password: ")?;

    let profile = ctx.auth().register(&name, &email, &password).await?;
    println!("Welcome, {}! You are signed in.", display::bold(&profile.name));
    Ok(())
}

pub async fn logout() -> Result<()> {
    let ctx = Context::load().await?;
    ctx.auth().logout().await?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(args: WhoamiArgs) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = ctx.auth().me().await;
    let user = ctx.settle(result).await?;

    if args.json {
        return display::print_json(&user);
    }

    println!("{} <{}>", display::bold(&user.name), user.email);
    if !user.email_verified {
        println!("{}", display::muted("email not verified"));
    }
    if let Some(team) = ctx.teams().current().await? {
        println!("Team: {} ({})", team.name, team.slug);
    }
    Ok(())
}
