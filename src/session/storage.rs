use super::TokenPair;
use crate::error::Result;
use crate::models::UserProfile;
use crate::store::{self, Store};
use async_trait::async_trait;
use std::sync::Mutex;

/// Durable home of the session: the profile record and the token pair
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load_tokens(&self) -> Result<Option<TokenPair>>;

    async fn save_tokens(&self, tokens: &TokenPair) -> Result<()>;

    async fn clear_tokens(&self) -> Result<()>;

    async fn load_profile(&self) -> Result<Option<UserProfile>>;

    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;

    async fn clear_profile(&self) -> Result<()>;
}

#[async_trait]
impl SessionStorage for Store {
    async fn load_tokens(&self) -> Result<Option<TokenPair>> {
        Ok(store::get_tokens(self.pool()).await?.map(|row| row.tokens))
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> Result<()> {
        store::save_tokens(self.pool(), tokens).await
    }

    async fn clear_tokens(&self) -> Result<()> {
        store::delete_tokens(self.pool()).await
    }

    async fn load_profile(&self) -> Result<Option<UserProfile>> {
        Ok(store::get_session(self.pool()).await?.map(|row| row.profile))
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        store::save_session(self.pool(), profile).await
    }

    async fn clear_profile(&self) -> Result<()> {
        store::delete_session(self.pool()).await
    }
}

/// Non-durable storage, for tests and one-shot tooling
#[derive(Default)]
pub struct MemoryStorage {
    tokens: Mutex<Option<TokenPair>>,
    profile: Mutex<Option<UserProfile>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
            profile: Mutex::new(None),
        }
    }

    /// What is currently persisted, bypassing any in-memory session
    pub fn stored_tokens(&self) -> Option<TokenPair> {
        lock(&self.tokens).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load_tokens(&self) -> Result<Option<TokenPair>> {
        Ok(lock(&self.tokens).clone())
    }

    async fn save_tokens(&self, tokens: &TokenPair) -> Result<()> {
        *lock(&self.tokens) = Some(tokens.clone());
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<()> {
        *lock(&self.tokens) = None;
        Ok(())
    }

    async fn load_profile(&self) -> Result<Option<UserProfile>> {
        Ok(lock(&self.profile).clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        *lock(&self.profile) = Some(profile.clone());
        Ok(())
    }

    async fn clear_profile(&self) -> Result<()> {
        *lock(&self.profile) = None;
        Ok(())
    }
}
