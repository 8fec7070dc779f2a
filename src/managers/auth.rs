use crate::api::{auth, users, ApiClient};
use crate::error::{Error, Result};
use crate::models::{AuthPayload, User, UserProfile};
use crate::session::AuthSignal;
use crate::store::{self, Store};
use tracing::{debug, info, instrument, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// Sign-in, registration and sign-out flows
pub struct AuthManager {
    client: ApiClient,
    store: Store,
}

impl AuthManager {
    pub fn new(client: ApiClient, store: Store) -> Self {
        Self { client, store }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(Error::validation("password", "must not be empty"));
        }

        let payload = auth::login(&self.client, email, password).await?;
        self.establish(payload).await
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        let email = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        let payload = auth::register(&self.client, name, email, password).await?;
        self.establish(payload).await
    }

    /// Persist the new session and re-arm the refresh cycle
    async fn establish(&self, payload: AuthPayload) -> Result<UserProfile> {
        let profile = payload.profile();
        self.client
            .session()
            .establish(profile.clone(), payload.tokens.into())
            .await?;
        self.client.interceptor().reset();
        info!(user = %profile.email, "Signed in");
        Ok(profile)
    }

    /// Revoke server-side if possible, then forget everything locally
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let tokens = self.client.session().tokens().await;
        if let Some(tokens) = tokens.as_deref() {
            match auth::logout(&self.client, Some(tokens)).await {
                Ok(payload) => debug!(success = payload.success, "Server-side logout"),
                Err(e) => warn!(error = %e, "Server-side logout failed, clearing local session anyway"),
            }
        }

        self.client.session().clear().await?;
        store::delete_selected_team(self.store.pool()).await?;
        self.client.signals().emit(AuthSignal::Logout);
        info!("Signed out");
        Ok(())
    }

    /// Fetch the current user and refresh the stored profile
    pub async fn me(&self) -> Result<User> {
        if self.client.session().tokens().await.is_none() {
            return Err(Error::NotLoggedIn);
        }
        let user = users::me(&self.client).await?;
        self.client
            .session()
            .set_profile(UserProfile::from(user.clone()))
            .await?;
        Ok(user)
    }
}

fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(Error::validation("email", "must contain '@'"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{client_over, FakeTransport};
    use crate::models::SelectedTeam;
    use crate::session::MemoryStorage;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    fn auth_payload(field: &str) -> serde_json::Value {
        json!({ field: {
            "tokens": { "accessToken": "new-access", "refreshToken": "new-refresh" },
            "userId": "u1", "email": "ada@example.com", "name": "Ada"
        }})
    }

    async fn manager(transport: Arc<FakeTransport>) -> (AuthManager, Arc<MemoryStorage>, Store) {
        let storage = Arc::new(MemoryStorage::new());
        let client = client_over(transport, storage.clone()).await;
        let store = Store::in_memory().await.unwrap();
        (AuthManager::new(client, store.clone()), storage, store)
    }

    #[tokio::test]
    async fn login_persists_session_and_next_call_uses_new_token() {
        let transport = FakeTransport::new()
            .respond("Login", auth_payload("login"))
            .respond(
                "Me",
                json!({ "me": { "id": "u1", "name": "Ada", "email": "ada@example.com" } }),
            );
        let (auth, storage, _) = manager(transport.clone()).await;

        let profile = auth.login(" ada@example.com ", "hunter22").await.unwrap();
        assert_eq!(profile.id, "u1");

        let stored = storage.stored_tokens().unwrap();
        assert_eq!(stored.access_token(), "new-access");
        assert_eq!(stored.refresh_token(), "new-refresh");
        assert!(auth.client.session().is_authenticated().await);

        // Login itself goes out without a bearer
        assert_eq!(transport.last("Login").unwrap().bearer, None);
        assert_eq!(
            transport.last("Login").unwrap().variables["input"]["email"],
            "ada@example.com"
        );

        auth.me().await.unwrap();
        assert_eq!(
            transport.last("Me").unwrap().bearer.as_deref(),
            Some("new-access")
        );
    }

    #[tokio::test]
    async fn register_validates_before_calling_api() {
        let transport = FakeTransport::new();
        let (auth, _, _) = manager(transport.clone()).await;

        assert_matches!(
            auth.register("", "a@b.c", "longenough").await,
            Err(Error::Validation { ref field, .. }) if field == "name"
        );
        assert_matches!(
            auth.register("Ada", "not-an-email", "longenough").await,
            Err(Error::Validation { ref field, .. }) if field == "email"
        );
        assert_matches!(
            auth.register("Ada", "a@b.c", "short").await,
            Err(Error::Validation { ref field, .. }) if field == "password"
        );
        assert_matches!(
            auth.login("a@b.c", "").await,
            Err(Error::Validation { ref field, .. }) if field == "password"
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn register_signs_in() {
        let transport = FakeTransport::new().respond("Register", auth_payload("register"));
        let (auth, _, _) = manager(transport.clone()).await;

        let profile = auth.register("Ada", "ada@example.com", "correct horse").await.unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(
            transport.last("Register").unwrap().variables["input"]["name"],
            "Ada"
        );
    }

    #[tokio::test]
    async fn logout_clears_everything_even_if_server_fails() {
        // No canned Logout response: the mutation errors
        let transport = FakeTransport::new().respond("Login", auth_payload("login"));
        let (auth, storage, store) = manager(transport.clone()).await;
        auth.login("ada@example.com", "hunter22").await.unwrap();

        let team = SelectedTeam {
            id: "t1".into(),
            name: "Ops".into(),
            slug: "ops".into(),
        };
        store::save_selected_team(store.pool(), &team).await.unwrap();
        let mut signals = auth.client.signals().channel();

        auth.logout().await.unwrap();

        assert_eq!(transport.count("Logout"), 1);
        assert_eq!(
            transport.last("Logout").unwrap().variables["input"]["refreshToken"],
            "new-refresh"
        );
        assert!(storage.stored_tokens().is_none());
        assert!(!auth.client.session().is_authenticated().await);
        assert!(store::get_selected_team(store.pool()).await.unwrap().is_none());
        assert_eq!(signals.recv().await.unwrap(), AuthSignal::Logout);
    }

    #[tokio::test]
    async fn me_requires_a_session() {
        let (auth, _, _) = manager(FakeTransport::new()).await;
        assert_matches!(auth.me().await, Err(Error::NotLoggedIn));
    }
}
