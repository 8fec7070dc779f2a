//! GraphQL request/response envelopes shared by the HTTP and WebSocket paths.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub query: &'static str,
    pub operation_name: &'static str,
    pub variables: Value,
}

impl GraphqlRequest {
    pub fn new(query: &'static str, operation_name: &'static str, variables: Value) -> Self {
        Self {
            query,
            operation_name,
            variables,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

impl GraphqlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|ext| ext.code.as_deref())
    }

    pub fn into_error(self) -> Error {
        Error::from_graphql_code(self.code(), &self.message)
    }
}

impl GraphqlResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// The `data` object, or the first error classified by its code
    pub fn into_data(self) -> Result<Value> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(first.into_error());
        }
        self.data.ok_or_else(|| Error::MissingData {
            field: "data".to_string(),
        })
    }
}

/// Deserialize `data.<field>` into `T`
pub fn extract<T: DeserializeOwned>(mut data: Value, field: &str) -> Result<T> {
    let value = data
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| Error::MissingData {
            field: field.to_string(),
        })?;
    Ok(serde_json::from_value(value)?)
}
