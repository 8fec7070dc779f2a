use super::context::{confirm, Context};
use crate::api::attachments::{self, Upload};
use crate::display::{self, Table};
use crate::error::{Error, Result};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum AttachmentsCommand {
    /// Attachments of a task
    #[command(visible_alias = "ls")]
    List {
        task_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Upload a file to a task
    Upload { task_id: String, path: PathBuf },

    /// Upload an image for a task description and print its URL
    Inline { path: PathBuf },

    /// Save an attachment locally (original file name by default)
    Download {
        task_id: String,
        attachment_id: String,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the authenticated download URL
    Url { attachment_id: String },

    Delete {
        attachment_id: String,

        #[arg(long, short)]
        yes: bool,
    },
}

pub async fn run(cmd: AttachmentsCommand) -> Result<()> {
    let ctx = Context::authenticated().await?;
    let result = dispatch(&ctx, cmd).await;
    ctx.settle(result).await
}

async fn dispatch(ctx: &Context, cmd: AttachmentsCommand) -> Result<()> {
    let client = &ctx.client;

    match cmd {
        AttachmentsCommand::List { task_id, json } => {
            let items = attachments::list(client, &task_id).await?;
            if json {
                return display::print_json(&items);
            }
            let mut table = Table::new(&["ID", "NAME", "TYPE", "SIZE", "UPLOADED"]);
            for a in &items {
                table.row(vec![
                    a.id.clone(),
                    a.original_name.clone(),
                    a.mime_type.clone(),
                    display::bytes(a.size),
                    display::timestamp(a.created_at),
                ]);
            }
            if table.is_empty() {
                println!("No attachments");
            } else {
                table.print();
            }
        }
        AttachmentsCommand::Upload { task_id, path } => {
            let upload = Upload::from_path(&path).await?;
            let attachment = attachments::upload(client, &task_id, &upload).await?;
            println!(
                "Uploaded {} ({}) as {}",
                attachment.original_name,
                display::bytes(attachment.size),
                attachment.id
            );
        }
        AttachmentsCommand::Inline { path } => {
            let upload = Upload::from_path(&path).await?;
            let url = attachments::upload_inline_image(client, &upload).await?;
            println!("{}", url);
        }
        AttachmentsCommand::Download {
            task_id,
            attachment_id,
            output,
        } => {
            let dest = match output {
                Some(path) => path,
                None => {
                    let items = attachments::list(client, &task_id).await?;
                    let attachment = items
                        .iter()
                        .find(|a| a.id == attachment_id)
                        .ok_or_else(|| Error::NotFound {
                            what: format!("attachment {}", attachment_id),
                        })?;
                    attachments::default_destination(attachment)
                }
            };
            let written = attachments::download(client, &attachment_id, &dest).await?;
            println!("Saved {} to {}", display::bytes(written), dest.display());
        }
        AttachmentsCommand::Url { attachment_id } => {
            println!("{}", attachments::download_url(client, &attachment_id));
        }
        AttachmentsCommand::Delete { attachment_id, yes } => {
            if !confirm(&format!("Delete attachment {}?", attachment_id), yes)? {
                return Ok(());
            }
            if attachments::delete(client, &attachment_id).await? {
                println!("Deleted attachment {}", attachment_id);
            } else {
                println!("Attachment {} was not deleted", attachment_id);
            }
        }
    }
    Ok(())
}
