//! A scripted GraphQL backend that issues and checks access tokens.

use async_trait::async_trait;
use opsdeck::api::{GraphqlRequest, GraphqlResponse, GraphqlTransport};
use opsdeck::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct ScriptedBackend {
    valid_access: Mutex<String>,
    refreshes: AtomicUsize,
    refresh_fails: AtomicBool,
    data: Mutex<HashMap<&'static str, Value>>,
    seen: Mutex<Vec<(&'static str, Option<String>)>>,
}

impl ScriptedBackend {
    /// Accepts only `valid_access` until a refresh issues a new token
    pub fn new(valid_access: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new(valid_access.to_string()),
            refreshes: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            data: Mutex::new(HashMap::new()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, operation: &'static str, data: Value) {
        self.data.lock().unwrap().insert(operation, data);
    }

    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Bearers sent with `operation`, in order
    pub fn bearers(&self, operation: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    fn error(code: &str, message: &str) -> Result<GraphqlResponse> {
        Ok(serde_json::from_value(json!({
            "errors": [{ "message": message, "extensions": { "code": code } }]
        }))?)
    }
}

#[async_trait]
impl GraphqlTransport for ScriptedBackend {
    async fn execute(&self, request: &GraphqlRequest, bearer: Option<&str>) -> Result<GraphqlResponse> {
        self.seen
            .lock()
            .unwrap()
            .push((request.operation_name, bearer.map(str::to_string)));

        if request.operation_name == "RefreshToken" {
            // Slow enough for concurrent callers to queue behind it
            tokio::time::sleep(Duration::from_millis(30)).await;
            if self.refresh_fails.load(Ordering::SeqCst) {
                return Self::error("UNAUTHENTICATED", "refresh token revoked");
            }
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            let access = format!("access-{}", n);
            *self.valid_access.lock().unwrap() = access.clone();
            return Ok(GraphqlResponse::from_data(json!({
                "refreshToken": { "accessToken": access, "refreshToken": format!("refresh-{}", n) }
            })));
        }

        let valid = self.valid_access.lock().unwrap().clone();
        if bearer != Some(valid.as_str()) {
            return Self::error("UNAUTHENTICATED", "jwt expired");
        }

        match self.data.lock().unwrap().get(request.operation_name) {
            Some(data) => Ok(GraphqlResponse::from_data(data.clone())),
            None => Self::error("INTERNAL_SERVER_ERROR", "no scripted response"),
        }
    }
}
