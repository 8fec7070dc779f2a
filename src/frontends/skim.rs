use crate::error::{Error, Result};
use crate::frontends::traits::{Picker, PickerItem, PickerOptions};
use async_trait::async_trait;
use skim::prelude::*;
use std::io::{Cursor, IsTerminal};
use tracing::debug;

/// In-process skim; needs an interactive terminal
pub struct SkimPicker;

impl SkimPicker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SkimPicker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Picker for SkimPicker {
    fn name(&self) -> &'static str {
        "skim"
    }

    fn is_available(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    async fn pick(&self, items: Vec<PickerItem>, options: PickerOptions) -> Result<Vec<String>> {
        debug!(item_count = items.len(), "Running skim picker");

        // display\tvalue, only the display column is matched and shown
        let input: String = items
            .iter()
            .map(|item| format!("{}\t{}", item.display, item.value))
            .collect::<Vec<_>>()
            .join("\n");

        // SkimOptions holds Rc handles, so it is built on the blocking thread
        tokio::task::spawn_blocking(move || run_skim(input, options))
            .await
            .map_err(|e| Error::PickerError {
                message: format!("skim task failed: {}", e),
            })?
    }
}

fn run_skim(input: String, options: PickerOptions) -> Result<Vec<String>> {
    let mut skim_options = SkimOptionsBuilder::default()
        .height("50%".to_string())
        .multi(options.multi_select)
        .delimiter("\t".to_string())
        .with_nth(vec!["1".to_string()])
        .build()
        .map_err(|e| Error::PickerError {
            message: format!("Failed to build skim options: {}", e),
        })?;

    if let Some(prompt) = options.prompt {
        skim_options.prompt = prompt;
    }
    if let Some(header) = options.header {
        skim_options.header = Some(header);
    }

    let reader = SkimItemReader::default();
    let items = reader.of_bufread(Cursor::new(input));

    let selected = Skim::run_with(&skim_options, Some(items))
        .filter(|output| !output.is_abort)
        .map(|output| {
            output
                .selected_items
                .iter()
                .map(|item| selected_value(&item.output()))
                .collect()
        })
        .unwrap_or_default();
    Ok(selected)
}

/// Value column of a `display\tvalue` line
fn selected_value(line: &str) -> String {
    line.split('\t').nth(1).unwrap_or(line).to_string()
}
