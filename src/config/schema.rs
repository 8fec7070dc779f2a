use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:3000/graphql";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/graphql";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoints")]
    pub endpoints: EndpointsConfig,

    #[serde(default = "default_subscriptions")]
    pub subscriptions: SubscriptionConfig,

    #[serde(default = "default_picker")]
    pub picker: PickerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            subscriptions: default_subscriptions(),
            picker: default_picker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Base URL of the REST API (attachments)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// GraphQL HTTP endpoint for queries and mutations
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// GraphQL WebSocket endpoint for subscriptions
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_endpoints() -> EndpointsConfig {
    EndpointsConfig {
        api_url: default_api_url(),
        graphql_url: default_graphql_url(),
        ws_url: default_ws_url(),
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Consecutive reconnect attempts before a subscription gives up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_subscriptions() -> SubscriptionConfig {
    SubscriptionConfig {
        retry_attempts: default_retry_attempts(),
        initial_delay_ms: default_initial_delay_ms(),
        max_delay_ms: default_max_delay_ms(),
    }
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl SubscriptionConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    /// Fuzzy finder: "auto", "fzf", "skim"
    #[serde(default = "default_finder")]
    pub finder: String,
}

fn default_picker() -> PickerConfig {
    PickerConfig {
        finder: default_finder(),
    }
}

fn default_finder() -> String {
    "auto".to_string()
}

impl Config {
    /// Apply `OPSDECK_*` endpoint overrides from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OPSDECK_API_URL") {
            self.endpoints.api_url = url;
        }
        if let Some(url) = lookup("OPSDECK_GRAPHQL_URL") {
            self.endpoints.graphql_url = url;
        }
        if let Some(url) = lookup("OPSDECK_WS_URL") {
            self.endpoints.ws_url = url;
        }
    }

    /// Check values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        let http = ["http://", "https://"];
        if !http.iter().any(|p| self.endpoints.api_url.starts_with(p)) {
            return Err(format!(
                "endpoints.api_url must start with http:// or https://, got '{}'",
                self.endpoints.api_url
            ));
        }
        if !http.iter().any(|p| self.endpoints.graphql_url.starts_with(p)) {
            return Err(format!(
                "endpoints.graphql_url must start with http:// or https://, got '{}'",
                self.endpoints.graphql_url
            ));
        }
        if !["ws://", "wss://"].iter().any(|p| self.endpoints.ws_url.starts_with(p)) {
            return Err(format!(
                "endpoints.ws_url must start with ws:// or wss://, got '{}'",
                self.endpoints.ws_url
            ));
        }

        if self.subscriptions.retry_attempts == 0 {
            return Err("subscriptions.retry_attempts must be at least 1".to_string());
        }
        if self.subscriptions.initial_delay_ms > self.subscriptions.max_delay_ms {
            return Err(format!(
                "subscriptions.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                self.subscriptions.initial_delay_ms, self.subscriptions.max_delay_ms
            ));
        }

        match self.picker.finder.as_str() {
            "auto" | "fzf" | "skim" => Ok(()),
            other => Err(format!(
                "picker.finder must be one of auto, fzf, skim; got '{}'",
                other
            )),
        }
    }
}
