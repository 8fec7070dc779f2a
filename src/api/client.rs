use super::auth::GraphqlRefresher;
use super::graphql::{extract, GraphqlRequest};
use super::transport::{GraphqlTransport, HttpTransport};
use crate::config::schema::{EndpointsConfig, DEFAULT_API_URL};
use crate::error::Result;
use crate::session::{AuthInterceptor, Session, Signals};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Entry point for every API call.
///
/// Authenticated operations run through the [`AuthInterceptor`], so an
/// expired access token is refreshed once and the call replayed.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn GraphqlTransport>,
    interceptor: AuthInterceptor,
    http: reqwest::Client,
    api_url: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn GraphqlTransport>, interceptor: AuthInterceptor) -> Self {
        Self {
            transport,
            interceptor,
            http: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Wire HTTP transport, refresher and interceptor from configured endpoints
    pub fn connect(endpoints: &EndpointsConfig, session: Session, signals: Signals) -> Self {
        let http = reqwest::Client::new();
        let transport: Arc<dyn GraphqlTransport> = Arc::new(HttpTransport::with_client(
            http.clone(),
            endpoints.graphql_url.clone(),
        ));
        let refresher = Arc::new(GraphqlRefresher::new(transport.clone()));
        let interceptor = AuthInterceptor::new(session, refresher, signals);

        Self {
            transport,
            interceptor,
            http,
            api_url: endpoints.api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn interceptor(&self) -> &AuthInterceptor {
        &self.interceptor
    }

    pub fn session(&self) -> &Session {
        self.interceptor.session()
    }

    pub fn signals(&self) -> &Signals {
        self.interceptor.signals()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Authenticated operation; returns `data.<field>`
    pub async fn query<T: DeserializeOwned>(
        &self,
        document: &'static str,
        operation: &'static str,
        variables: Value,
        field: &str,
    ) -> Result<T> {
        let request = GraphqlRequest::new(document, operation, variables);
        let request = &request;
        let transport = &self.transport;

        let data = self
            .interceptor
            .execute(move |token| async move {
                transport
                    .execute(request, token.as_deref())
                    .await?
                    .into_data()
            })
            .await?;
        extract(data, field)
    }

    /// Operation sent as-is, bypassing refresh (login, register, logout)
    pub(crate) async fn query_direct<T: DeserializeOwned>(
        &self,
        request: GraphqlRequest,
        field: &str,
        bearer: Option<&str>,
    ) -> Result<T> {
        let data = self.transport.execute(&request, bearer).await?.into_data()?;
        extract(data, field)
    }
}
