//! Typed client operations against the dashboard API.
//!
//! Each domain module holds its GraphQL documents next to thin async
//! functions taking an [`ApiClient`]. Real-time updates go through
//! [`subscriptions`]; task attachments through the REST endpoints in
//! [`attachments`].

pub mod attachments;
pub mod auth;
pub mod billing;
pub mod client;
pub mod dashboard;
pub mod graphql;
pub mod kanban;
pub mod projects;
pub mod reconnect;
pub mod servers;
pub mod subscriptions;
pub mod teams;
pub mod transport;
pub mod users;

pub use auth::GraphqlRefresher;
pub use client::ApiClient;
pub use graphql::{GraphqlError, GraphqlRequest, GraphqlResponse};
pub use reconnect::ReconnectPolicy;
pub use subscriptions::{Subscription, SubscriptionClient};
pub use transport::{GraphqlTransport, HttpTransport};
