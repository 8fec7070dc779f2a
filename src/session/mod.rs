//! Authenticated session state and the token-refresh interceptor.
//!
//! A [`Session`] is constructed explicitly and handed to whatever issues
//! network calls. Token writes are crate-private: only the
//! [`AuthInterceptor`] and the login/logout flows in
//! [`crate::managers::AuthManager`] replace or clear the pair.

pub mod interceptor;
pub mod signals;
pub mod storage;
pub mod tokens;

pub use interceptor::{AuthInterceptor, RefreshState, TokenRefresher};
pub use signals::{AuthSignal, Signals, SubscriptionId};
pub use storage::{MemoryStorage, SessionStorage};
pub use tokens::TokenPair;

use crate::error::Result;
use crate::models::UserProfile;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    storage: Arc<dyn SessionStorage>,
    tokens: RwLock<Option<Arc<TokenPair>>>,
    profile: RwLock<Option<UserProfile>>,
}

impl Session {
    /// Empty session over the given storage
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self::from_parts(storage, None, None)
    }

    /// Read the persisted profile and tokens back in
    pub async fn restore(storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let tokens = storage.load_tokens().await?;
        let profile = storage.load_profile().await?;
        debug!(
            has_tokens = tokens.is_some(),
            has_profile = profile.is_some(),
            "Restored session"
        );
        Ok(Self::from_parts(storage, tokens, profile))
    }

    fn from_parts(
        storage: Arc<dyn SessionStorage>,
        tokens: Option<TokenPair>,
        profile: Option<UserProfile>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                storage,
                tokens: RwLock::new(tokens.map(Arc::new)),
                profile: RwLock::new(profile),
            }),
        }
    }

    /// Snapshot of the current pair; never a mix of two generations
    pub async fn tokens(&self) -> Option<Arc<TokenPair>> {
        self.inner.tokens.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens().await.map(|t| t.access_token().to_string())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens().await.map(|t| t.refresh_token().to_string())
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.inner.profile.read().await.clone()
    }

    /// Both a token and a profile are needed to count as signed in
    pub async fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().await.is_some() && self.inner.profile.read().await.is_some()
    }

    /// Persist then publish a new pair, so no reader sees an unsaved pair
    pub(crate) async fn replace_tokens(&self, tokens: TokenPair) -> Result<Arc<TokenPair>> {
        self.inner.storage.save_tokens(&tokens).await?;
        let tokens = Arc::new(tokens);
        *self.inner.tokens.write().await = Some(tokens.clone());
        Ok(tokens)
    }

    pub(crate) async fn set_profile(&self, profile: UserProfile) -> Result<()> {
        self.inner.storage.save_profile(&profile).await?;
        *self.inner.profile.write().await = Some(profile);
        Ok(())
    }

    /// Start a fresh session after login or registration
    pub(crate) async fn establish(&self, profile: UserProfile, tokens: TokenPair) -> Result<()> {
        self.replace_tokens(tokens).await?;
        self.set_profile(profile).await
    }

    /// Drop the token pair (memory first, so nothing new picks it up)
    pub(crate) async fn clear_tokens(&self) -> Result<()> {
        *self.inner.tokens.write().await = None;
        self.inner.storage.clear_tokens().await
    }

    /// Forget everything: tokens and profile
    pub(crate) async fn clear(&self) -> Result<()> {
        self.clear_tokens().await?;
        *self.inner.profile.write().await = None;
        self.inner.storage.clear_profile().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn restore_reads_persisted_state() {
        let storage = Arc::new(MemoryStorage::with_tokens(TokenPair::new(
            "a".into(),
            "r".into(),
        )));
        let session = Session::restore(storage).await.unwrap();

        assert_eq!(session.access_token().await.as_deref(), Some("a"));
        assert_eq!(session.refresh_token().await.as_deref(), Some("r"));
        // No profile yet, so not signed in
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn replace_persists_before_publishing() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone());

        session
            .replace_tokens(TokenPair::new("a2".into(), "r2".into()))
            .await
            .unwrap();

        let stored = storage.stored_tokens().unwrap();
        assert_eq!(stored.access_token(), "a2");
        assert_eq!(stored.refresh_token(), "r2");
        assert_eq!(session.tokens().await.unwrap().as_ref(), &stored);
    }

    #[tokio::test]
    async fn snapshots_are_never_mixed() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage);
        session
            .replace_tokens(TokenPair::new("a1".into(), "r1".into()))
            .await
            .unwrap();

        let writer = {
            let session = session.clone();
            tokio::spawn(async move {
                for i in 2..200 {
                    session
                        .replace_tokens(TokenPair::new(format!("a{i}"), format!("r{i}")))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..400 {
            let pair = session.tokens().await.unwrap();
            assert_eq!(&pair.access_token()[1..], &pair.refresh_token()[1..]);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone());
        session
            .establish(profile(), TokenPair::new("a".into(), "r".into()))
            .await
            .unwrap();
        assert!(session.is_authenticated().await);

        session.clear().await.unwrap();
        assert!(!session.is_authenticated().await);
        assert!(session.tokens().await.is_none());
        assert!(storage.stored_tokens().is_none());
        assert!(storage.load_profile().await.unwrap().is_none());
    }
}
