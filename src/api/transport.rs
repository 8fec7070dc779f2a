use super::graphql::{GraphqlRequest, GraphqlResponse};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// Carries one GraphQL operation to the API
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// `bearer` is the raw access token, if the call is authenticated
    async fn execute(&self, request: &GraphqlRequest, bearer: Option<&str>)
        -> Result<GraphqlResponse>;
}

/// GraphQL over HTTP POST
pub struct HttpTransport {
    client: reqwest::Client,
    graphql_url: String,
}

impl HttpTransport {
    pub fn new(graphql_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), graphql_url)
    }

    /// Share a connection pool with the REST attachment calls
    pub fn with_client(client: reqwest::Client, graphql_url: impl Into<String>) -> Self {
        Self {
            client,
            graphql_url: graphql_url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.graphql_url
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        bearer: Option<&str>,
    ) -> Result<GraphqlResponse> {
        debug!(
            operation = request.operation_name,
            authenticated = bearer.is_some(),
            "GraphQL request"
        );

        let mut builder = self.client.post(&self.graphql_url).json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        classify_response(status, &body)
    }
}

/// Map an HTTP status and body onto a GraphQL response or an error
pub(crate) fn classify_response(status: StatusCode, body: &str) -> Result<GraphqlResponse> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthenticated {
            message: non_empty(body, "Unauthorized"),
        });
    }

    let parsed = serde_json::from_str::<GraphqlResponse>(body);
    if status.is_success() {
        return Ok(parsed?);
    }

    // Servers also answer 4xx with a regular `errors` envelope
    match parsed {
        Ok(parsed) if !parsed.errors.is_empty() => Ok(parsed),
        _ => Err(Error::Http {
            status: status.as_u16(),
            message: non_empty(body, status.canonical_reason().unwrap_or("Request failed")),
        }),
    }
}

fn non_empty(body: &str, fallback: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthRejection;

    #[test]
    fn status_401_is_unauthenticated() {
        let err = classify_response(StatusCode::UNAUTHORIZED, "").unwrap_err();
        assert_eq!(err.auth_rejection(), Some(AuthRejection::Unauthenticated));
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[test]
    fn error_envelope_on_400_is_parsed() {
        let body = r#"{"errors":[{"message":"bad","extensions":{"code":"BAD_USER_INPUT"}}]}"#;
        let response = classify_response(StatusCode::BAD_REQUEST, body).unwrap();
        assert!(matches!(
            response.into_data().unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn plain_server_error() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, Error::Http { status: 502, ref message } if message == "upstream down"));
    }

    #[test]
    fn success_body_is_parsed() {
        let response = classify_response(StatusCode::OK, r#"{"data":{"me":null}}"#).unwrap();
        assert!(response.errors.is_empty());
        assert!(response.data.is_some());
    }

    #[test]
    fn garbage_success_body_is_json_error() {
        let err = classify_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
