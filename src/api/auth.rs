//! Login, registration, logout and token refresh mutations.

use super::client::ApiClient;
use super::graphql::{extract, GraphqlRequest};
use super::transport::GraphqlTransport;
use crate::error::Result;
use crate::models::{AuthPayload, AuthTokens, LogoutPayload};
use crate::session::{TokenPair, TokenRefresher};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const LOGIN: &str = r#"
mutation Login($input: LoginInput!) {
  login(input: $input) {
    tokens { accessToken refreshToken }
    userId
    email
    name
  }
}"#;

pub const REGISTER: &str = r#"
mutation Register($input: RegisterInput!) {
  register(input: $input) {
    tokens { accessToken refreshToken }
    userId
    email
    name
  }
}"#;

pub const LOGOUT: &str = r#"
mutation Logout($input: LogoutInput) {
  logout(input: $input) { success message }
}"#;

pub const REFRESH_TOKEN: &str = r#"
mutation RefreshToken($input: RefreshTokenInput!) {
  refreshToken(input: $input) { accessToken refreshToken }
}"#;

pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<AuthPayload> {
    let request = GraphqlRequest::new(
        LOGIN,
        "Login",
        json!({ "input": { "email": email, "password": password } }),
    );
    client.query_direct(request, "login", None).await
}

pub async fn register(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthPayload> {
    let request = GraphqlRequest::new(
        REGISTER,
        "Register",
        json!({ "input": { "name": name, "email": email, "password": password } }),
    );
    client.query_direct(request, "register", None).await
}

/// Revoke the refresh token server-side. Never refreshes first.
pub async fn logout(client: &ApiClient, tokens: Option<&TokenPair>) -> Result<LogoutPayload> {
    let input = tokens.map(|t| json!({ "refreshToken": t.refresh_token() }));
    let request = GraphqlRequest::new(LOGOUT, "Logout", json!({ "input": input }));
    client
        .query_direct(request, "logout", tokens.map(|t| t.access_token()))
        .await
}

/// [`TokenRefresher`] backed by the `refreshToken` mutation
pub struct GraphqlRefresher {
    transport: Arc<dyn GraphqlTransport>,
}

impl GraphqlRefresher {
    pub fn new(transport: Arc<dyn GraphqlTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TokenRefresher for GraphqlRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        debug!("Requesting new token pair");
        let request = GraphqlRequest::new(
            REFRESH_TOKEN,
            "RefreshToken",
            json!({ "input": { "refreshToken": refresh_token } }),
        );
        // The expired access token must not be sent along
        let data = self.transport.execute(&request, None).await?.into_data()?;
        let tokens: AuthTokens = extract(data, "refreshToken")?;
        Ok(tokens.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};

    #[tokio::test]
    async fn login_is_sent_without_bearer() {
        let transport = FakeTransport::new().respond(
            "Login",
            json!({ "login": {
                "tokens": { "accessToken": "a1", "refreshToken": "r1" },
                "userId": "u1", "email": "ada@example.com", "name": "Ada"
            }}),
        );
        let client = signed_in_client(transport.clone()).await;

        let payload = login(&client, "ada@example.com", "hunter22").await.unwrap();
        assert_eq!(payload.tokens.access_token, "a1");
        assert_eq!(payload.profile().email, "ada@example.com");

        let sent = transport.last("Login").unwrap();
        assert!(sent.bearer.is_none());
        assert_eq!(sent.variables["input"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn refresher_uses_refresh_token_mutation() {
        let transport = FakeTransport::new().respond(
            "RefreshToken",
            json!({ "refreshToken": { "accessToken": "a2", "refreshToken": "r2" } }),
        );
        let refresher = GraphqlRefresher::new(transport.clone());

        let pair = refresher.refresh("r1").await.unwrap();
        assert_eq!(pair.access_token(), "a2");
        assert_eq!(pair.refresh_token(), "r2");

        let sent = transport.last("RefreshToken").unwrap();
        assert!(sent.bearer.is_none());
        assert_eq!(sent.variables["input"]["refreshToken"], "r1");
    }

    #[tokio::test]
    async fn logout_sends_refresh_token() {
        let transport = FakeTransport::new().respond(
            "Logout",
            json!({ "logout": { "success": true, "message": null } }),
        );
        let client = signed_in_client(transport.clone()).await;
        let tokens = TokenPair::new("a".into(), "r".into());

        let payload = logout(&client, Some(&tokens)).await.unwrap();
        assert!(payload.success);

        let sent = transport.last("Logout").unwrap();
        assert_eq!(sent.bearer.as_deref(), Some("a"));
        assert_eq!(sent.variables["input"]["refreshToken"], "r");
    }
}
