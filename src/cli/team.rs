use super::context::{confirm, Context};
use crate::api::teams;
use crate::display::{self, Table};
use crate::error::{Error, Result};
use crate::frontends::{detect_picker, pick_one, team_items};
use crate::models::TeamRole;
use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum TeamCommand {
    /// List your teams; the selected one is marked
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Select the team that scopes team commands (picker without a slug)
    Use {
        slug: Option<String>,
    },

    /// Show the selected team (or another by slug) with its members
    Show {
        slug: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Create a team and select it
    Create {
        name: String,

        #[arg(long)]
        slug: Option<String>,
    },

    /// Rename a team
    Rename {
        slug: String,
        name: String,
    },

    /// Invite someone by email
    Invite {
        email: String,

        #[arg(long, default_value = "MEMBER")]
        role: TeamRole,
    },

    /// Accept an invitation token
    Accept {
        token: String,
    },

    /// Leave a team
    Leave {
        slug: String,

        #[arg(long, short)]
        yes: bool,
    },

    /// Delete a team you own
    Delete {
        slug: String,

        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: TeamCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: TeamCommand) -> Result<()> {
    let manager = ctx.teams();

    match cmd {
        TeamCommand::List(args) => {
            let teams = manager.list().await?;
            if args.json {
                return display::print_json(&teams);
            }
            let current = manager.current().await?;
            let mut table = Table::new(&["", "NAME", "SLUG", "MEMBERS"]);
            for team in &teams {
                let marker = if current.as_ref().is_some_and(|c| c.id == team.id) {
                    "*"
                } else {
                    ""
                };
                table.row(vec![
                    marker.to_string(),
                    team.name.clone(),
                    team.slug.clone(),
                    team.members.len().to_string(),
                ]);
            }
            if table.is_empty() {
                println!("No teams yet. Create one with: opsdeck team create <name>");
            } else {
                table.print();
            }
        }
        TeamCommand::Use { slug } => {
            let slug = match slug {
                Some(slug) => slug,
                None => {
                    let teams = teams::my_teams(&ctx.client).await?;
                    let current = manager.current().await?;
                    let picker = detect_picker(&ctx.config.picker.finder)?;
                    match pick_one(picker.as_ref(), team_items(&teams, current.as_ref()), "team> ").await? {
                        Some(slug) => slug,
                        None => return Ok(()),
                    }
                }
            };
            let selected = manager.select_slug(&slug).await?;
            println!("Using team {} ({})", display::bold(&selected.name), selected.slug);
        }
        TeamCommand::Show { slug, json } => {
            let slug = match slug {
                Some(slug) => slug,
                None => ctx.team().await?.slug,
            };
            let team = teams::team_by_slug(&ctx.client, &slug).await?;
            if json {
                return display::print_json(&team);
            }
            println!("{} ({})", display::bold(&team.name), team.slug);
            let mut table = Table::new(&["MEMBER", "EMAIL", "ROLE"]);
            for member in &team.members {
                let (name, email) = member
                    .user
                    .as_ref()
                    .map(|u| (u.name.clone(), u.email.clone().unwrap_or_default()))
                    .unwrap_or_default();
                table.row(vec![
                    name,
                    email,
                    member.role.map(|r| r.to_string()).unwrap_or_default(),
                ]);
            }
            table.print();
        }
        TeamCommand::Create { name, slug } => {
            let team = manager.create(&name, slug.as_deref()).await?;
            println!("Created and selected team {} ({})", team.name, team.slug);
        }
        TeamCommand::Rename { slug, name } => {
            let team = teams::team_by_slug(&ctx.client, &slug).await?;
            let team = teams::update_team(&ctx.client, &team.id, &name).await?;
            if manager.current().await?.is_some_and(|c| c.id == team.id) {
                manager.select(&team).await?;
            }
            println!("Renamed team to {}", team.name);
        }
        TeamCommand::Invite { email, role } => {
            if !email.contains('@') {
                return Err(Error::validation("email", "must contain '@'"));
            }
            let team = ctx.team().await?;
            teams::invite_member(&ctx.client, &team.id, &email, role).await?;
            println!("Invited {} to {} as {}", email, team.slug, role);
        }
        TeamCommand::Accept { token } => {
            teams::accept_invite(&ctx.client, &token).await?;
            manager.list().await?;
            println!("Invitation accepted");
        }
        TeamCommand::Leave { slug, yes } => {
            let team = teams::team_by_slug(&ctx.client, &slug).await?;
            if !confirm(&format!("Leave team {}?", team.name), yes)? {
                return Ok(());
            }
            manager.leave(&team.id).await?;
            println!("Left team {}", team.slug);
        }
        TeamCommand::Delete { slug, yes } => {
            let team = teams::team_by_slug(&ctx.client, &slug).await?;
            if !confirm(&format!("Delete team {} and all its data?", team.name), yes)? {
                return Ok(());
            }
            manager.delete(&team.id).await?;
            println!("Deleted team {}", team.slug);
        }
    }
    Ok(())
}
