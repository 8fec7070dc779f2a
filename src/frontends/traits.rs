use crate::error::{Error, Result};
use crate::models::{SelectedTeam, Team};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct PickerItem {
    /// What the user sees
    pub display: String,
    /// What gets returned on selection
    pub value: String,
}

impl PickerItem {
    pub fn new(display: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PickerOptions {
    pub prompt: Option<String>,
    pub header: Option<String>,
    pub multi_select: bool,
}

#[async_trait]
pub trait Picker: Send + Sync {
    /// Picker name as written in `picker.finder`
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Run the picker; an empty result means the user cancelled
    async fn pick(&self, items: Vec<PickerItem>, options: PickerOptions) -> Result<Vec<String>>;
}

/// Picker named by `finder` ("auto", "skim" or "fzf")
pub fn detect_picker(finder: &str) -> Result<Box<dyn Picker>> {
    let candidates: Vec<Box<dyn Picker>> = match finder {
        "skim" => vec![Box::new(super::SkimPicker::new())],
        "fzf" => vec![Box::new(super::FzfPicker::new())],
        // Rust-native first, then fzf
        _ => vec![
            Box::new(super::SkimPicker::new()),
            Box::new(super::FzfPicker::new()),
        ],
    };

    candidates
        .into_iter()
        .find(|picker| picker.is_available())
        .ok_or(Error::NoPickerAvailable)
}

/// One line per team, current selection marked
pub fn team_items(teams: &[Team], current: Option<&SelectedTeam>) -> Vec<PickerItem> {
    teams
        .iter()
        .map(|team| {
            let marker = if current.is_some_and(|c| c.id == team.id) {
                "*"
            } else {
                " "
            };
            PickerItem::new(format!("{} {} ({})", marker, team.name, team.slug), &team.slug)
        })
        .collect()
}

/// Pick a single value; `None` if the user cancelled
pub async fn pick_one(
    picker: &dyn Picker,
    items: Vec<PickerItem>,
    prompt: &str,
) -> Result<Option<String>> {
    let options = PickerOptions {
        prompt: Some(prompt.to_string()),
        ..Default::default()
    };
    Ok(picker.pick(items, options).await?.into_iter().next())
}
