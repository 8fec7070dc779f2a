use crate::error::{Error, Result};
use crate::frontends::traits::{Picker, PickerItem, PickerOptions};
use async_trait::async_trait;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// External `fzf` binary
pub struct FzfPicker;

impl FzfPicker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FzfPicker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Picker for FzfPicker {
    fn name(&self) -> &'static str {
        "fzf"
    }

    fn is_available(&self) -> bool {
        Command::new("fzf").arg("--version").output().is_ok()
    }

    async fn pick(&self, items: Vec<PickerItem>, options: PickerOptions) -> Result<Vec<String>> {
        debug!(item_count = items.len(), "Running fzf picker");

        let input: String = items
            .iter()
            .map(|item| format!("{}\t{}", item.display, item.value))
            .collect::<Vec<_>>()
            .join("\n");

        tokio::task::spawn_blocking(move || {
            let mut cmd = Command::new("fzf");
            if options.multi_select {
                cmd.arg("--multi");
            }
            if let Some(prompt) = &options.prompt {
                cmd.arg("--prompt").arg(prompt);
            }
            if let Some(header) = &options.header {
                cmd.arg("--header").arg(header);
            }
            // Show the display field, print the whole line
            cmd.arg("--delimiter").arg("\t").arg("--with-nth").arg("1");

            let mut child = cmd
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| picker_error("Failed to spawn fzf", e))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .map_err(|e| picker_error("Failed to write to fzf", e))?;
            }

            let output = child
                .wait_with_output()
                .map_err(|e| picker_error("Failed to wait for fzf", e))?;

            // Non-zero exit: nothing matched or the user pressed Esc
            if !output.status.success() {
                return Ok(Vec::new());
            }

            Ok(parse_selection(&String::from_utf8_lossy(&output.stdout)))
        })
        .await
        .map_err(|e| Error::PickerError {
            message: format!("fzf task failed: {}", e),
        })?
    }
}

fn picker_error(context: &str, err: std::io::Error) -> Error {
    Error::PickerError {
        message: format!("{}: {}", context, err),
    }
}

/// Values from fzf output lines (`display\tvalue`)
fn parse_selection(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').nth(1).unwrap_or(line).to_string())
        .collect()
}
