use crate::config;
use crate::display;
use crate::error::{Error, Result};
use anyhow::Context;
use clap::Subcommand;
use sha2::{Digest, Sha256};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::Command;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Open the config file in $VISUAL / $EDITOR and validate it on save
    Edit,

    /// Print the effective configuration (file, .env and OPSDECK_* overrides)
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Print the config file location
    Path,
}

pub async fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Edit => edit(),
        ConfigCommand::Show { json } => {
            let config = config::load()?;
            if json {
                return display::print_json(&config);
            }
            let content = toml::to_string_pretty(&config)
                .map_err(|e| Error::ConfigError(format!("Failed to render config: {}", e)))?;
            print!("{}", content);
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", config::config_path()?.display());
            Ok(())
        }
    }
}

/// Priority: VISUAL > EDITOR > vi
fn get_editor() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

fn hash_file(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&content)))
}

fn open_editor(editor: &str, path: &Path) -> Result<()> {
    let status = Command::new(editor)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;

    if !status.success() {
        return Err(Error::ConfigError(format!(
            "Editor exited with error status: {}",
            status
        )));
    }
    Ok(())
}

fn prompt_validation_failure() -> anyhow::Result<String> {
    println!("\nThe config file has errors. What would you like to do?");
    println!("  1. Edit again to fix errors");
    println!("  2. Discard changes (config will remain invalid until fixed)");
    println!("  3. Keep invalid config anyway (not recommended)");
    print!("\nChoice (1-3): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Parse and validate the file as written, without env overrides
fn check(path: &Path) -> std::result::Result<(), String> {
    let config = config::load_file().map_err(|e| format!("{:#}", e))?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "Config validated");
    Ok(())
}

fn edit() -> Result<()> {
    config::ensure_config_dir()?;
    let config_path = config::config_path()?;

    if !config_path.exists() {
        config::save_default()?;
        println!("Created default config at: {}", config_path.display());
    }

    let hash_before = hash_file(&config_path).context("Failed to hash config file before editing")?;

    let editor = get_editor();
    open_editor(&editor, &config_path)?;

    let hash_after = hash_file(&config_path).context("Failed to hash config file after editing")?;
    if hash_before == hash_after {
        println!("No changes made to config");
        return Ok(());
    }

    while let Err(problem) = check(&config_path) {
        eprintln!("\nConfig is invalid: {}", problem);

        if !io::stdin().is_terminal() {
            return Err(Error::ConfigError(format!(
                "Config is invalid in non-interactive mode. Please fix manually: {}",
                config_path.display()
            )));
        }

        match prompt_validation_failure()?.as_str() {
            "1" => open_editor(&editor, &config_path)?,
            "2" => {
                println!("\nPlease manually fix the config file or delete it to start over.");
                return Err(Error::ConfigError(problem));
            }
            "3" => {
                println!("\nWarning: Config file contains errors. Commands will refuse to run until it is fixed.");
                return Ok(());
            }
            _ => return Err(Error::ConfigError("Invalid choice".to_string())),
        }
    }

    println!(
        "Config saved and validated successfully: {}",
        config_path.display()
    );
    Ok(())
}
