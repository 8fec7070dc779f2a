use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// How the API rejected a request for auth reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Access token missing or expired; a refresh may recover.
    Unauthenticated,
    /// Authenticated but not allowed; refreshing cannot help.
    Forbidden,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not authenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Access denied: {message}. Sign in again with: opsdeck login")]
    Forbidden { message: String },

    #[error("Session expired. Sign in again with: opsdeck login")]
    SessionExpired,

    #[error("Not logged in. Sign in with: opsdeck login")]
    NotLoggedIn,

    #[error("No team selected. Pick one with: opsdeck team use")]
    NoTeamSelected,

    #[error("Team not found: {slug}. List your teams with: opsdeck team list")]
    TeamNotFound { slug: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("API error ({code}): {message}")]
    GraphQl { code: String, message: String },

    #[error("API returned no data for '{field}'")]
    MissingData { field: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Subscription closed after {attempts} failed reconnect attempts")]
    SubscriptionGaveUp { attempts: u32 },

    #[error("No fuzzy finder available for interactive selection. Install skim (recommended): cargo install skim, or install fzf: brew install fzf, or pass the team slug directly: opsdeck team use <slug>")]
    NoPickerAvailable,

    #[error("Picker failed: {message}")]
    PickerError { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database corrupted: {path}. {suggestion}")]
    DatabaseCorrupted { path: PathBuf, suggestion: String },

    #[error("Failed to open database: {path}")]
    DatabaseOpen { path: PathBuf, source: sqlx::Error },

    #[error("Migration failed: {0}")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

impl Error {
    /// Classify an error as an auth rejection the interceptor must handle.
    pub fn auth_rejection(&self) -> Option<AuthRejection> {
        match self {
            Error::Unauthenticated { .. } => Some(AuthRejection::Unauthenticated),
            Error::Forbidden { .. } => Some(AuthRejection::Forbidden),
            Error::Http { status: 401, .. } => Some(AuthRejection::Unauthenticated),
            _ => None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Build an error from a GraphQL `extensions.code` and message.
    pub fn from_graphql_code(code: Option<&str>, message: &str) -> Self {
        match code {
            Some("UNAUTHENTICATED") => Error::Unauthenticated {
                message: message.to_string(),
            },
            Some("FORBIDDEN") => Error::Forbidden {
                message: message.to_string(),
            },
            Some("NOT_FOUND") => Error::NotFound {
                what: message.to_string(),
            },
            Some("BAD_USER_INPUT") => Error::Validation {
                field: "input".to_string(),
                message: message.to_string(),
            },
            other => Error::GraphQl {
                code: other.unwrap_or("UNKNOWN").to_string(),
                message: message.to_string(),
            },
        }
    }
}
