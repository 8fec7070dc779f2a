//! Client-side copies of the entities owned by the dashboard API.
//!
//! Field names follow the GraphQL schema (camelCase on the wire); most
//! fields are optional because different queries select different slices.

pub mod billing;
pub mod enums;
pub mod kanban;
pub mod project;
pub mod server;
pub mod team;
pub mod user;

pub use billing::*;
pub use enums::*;
pub use kanban::*;
pub use project::*;
pub use server::*;
pub use team::*;
pub use user::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file attached to a task, served by the REST attachment API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub original_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub uploaded_by: Option<UserRef>,
}
