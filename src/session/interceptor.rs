//! Token-refresh interceptor.
//!
//! Every authenticated call goes through [`AuthInterceptor::execute`]. When
//! the API rejects an access token, exactly one refresh runs at a time; all
//! other rejected calls queue behind it and are replayed, in the order they
//! queued, once the new pair has been persisted. A failed refresh clears
//! the tokens, fails every queued call with its original error and emits a
//! single [`AuthSignal::Logout`]. A forbidden response always logs out,
//! even mid-refresh: the refreshed pair is then discarded.
//!
//! ```text
//!            401 / UNAUTHENTICATED            refresh ok
//!   Idle ───────────────────────────▶ Refreshing ─────────▶ Idle
//!    │                                    │
//!    │ FORBIDDEN / no refresh token       │ refresh failed
//!    ▼                                    ▼
//!  LoggedOut ◀────────────────────────────┘
//! ```

use super::signals::{AuthSignal, Signals};
use super::tokens::TokenPair;
use super::Session;
use crate::error::{AuthRejection, Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Exchanges a refresh token for a new pair
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    LoggedOut,
}

/// What a queued call learns when the refresh cycle ends
type Outcome = Option<Arc<TokenPair>>;

struct Cycle {
    state: RefreshState,
    /// Bumped after each successful refresh, under the same lock as `state`
    generation: u64,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
    /// Set when a forbidden response logs out while a refresh is running
    revoked: bool,
}

#[derive(Clone)]
pub struct AuthInterceptor {
    inner: Arc<Inner>,
}

struct Inner {
    session: Session,
    refresher: Arc<dyn TokenRefresher>,
    signals: Signals,
    cycle: Mutex<Cycle>,
}

enum Admission {
    /// Tokens were already refreshed after this call was sent
    AlreadyFresh,
    /// Wait for the refresh in progress (possibly one we just started)
    Wait(oneshot::Receiver<Outcome>),
    /// Session is gone; fail without another logout
    LoggedOut,
}

impl AuthInterceptor {
    pub fn new(session: Session, refresher: Arc<dyn TokenRefresher>, signals: Signals) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                refresher,
                signals,
                cycle: Mutex::new(Cycle {
                    state: RefreshState::Idle,
                    generation: 0,
                    waiters: VecDeque::new(),
                    revoked: false,
                }),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn signals(&self) -> &Signals {
        &self.inner.signals
    }

    pub fn state(&self) -> RefreshState {
        self.cycle().state
    }

    /// Back to `Idle` after a fresh login. A refresh in flight is left alone.
    pub fn reset(&self) {
        let mut cycle = self.cycle();
        if cycle.state == RefreshState::LoggedOut {
            cycle.state = RefreshState::Idle;
        }
    }

    /// Run `op` with the current access token, recovering from expiry.
    ///
    /// `op` may be called twice: once with the token current at call time
    /// and, after a successful refresh, once more with the new one.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let sent_generation = self.cycle().generation;
        let token = self.inner.session.access_token().await;

        let err = match op(token).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.auth_rejection() {
            None => Err(err),
            Some(AuthRejection::Forbidden) => {
                warn!(error = %err, "Request forbidden, logging out");
                self.force_logout().await;
                Err(err)
            }
            Some(AuthRejection::Unauthenticated) => {
                debug!(error = %err, "Access token rejected");
                match self.wait_for_tokens(sent_generation).await {
                    Some(tokens) => self.replay(&op, &tokens).await,
                    None => Err(err),
                }
            }
        }
    }

    async fn replay<T, F, Fut>(&self, op: &F, tokens: &TokenPair) -> Result<T>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op(Some(tokens.access_token().to_string())).await {
            Ok(value) => Ok(value),
            Err(err) => match err.auth_rejection() {
                Some(AuthRejection::Forbidden) => {
                    self.force_logout().await;
                    Err(err)
                }
                // Refreshed token rejected too; one replay is all we do
                Some(AuthRejection::Unauthenticated) => {
                    warn!(error = %err, "Replayed request rejected with refreshed token");
                    Err(Error::SessionExpired)
                }
                None => Err(err),
            },
        }
    }

    /// Resolve to the pair a rejected call should replay with, or `None`
    async fn wait_for_tokens(&self, sent_generation: u64) -> Outcome {
        let admission = {
            let mut cycle = self.cycle();
            match cycle.state {
                RefreshState::Idle if cycle.generation != sent_generation => Admission::AlreadyFresh,
                RefreshState::LoggedOut => Admission::LoggedOut,
                RefreshState::Refreshing => {
                    let (tx, rx) = oneshot::channel();
                    cycle.waiters.push_back(tx);
                    debug!(queued = cycle.waiters.len(), "Queued request behind token refresh");
                    Admission::Wait(rx)
                }
                RefreshState::Idle => {
                    let (tx, rx) = oneshot::channel();
                    cycle.state = RefreshState::Refreshing;
                    cycle.waiters.push_back(tx);
                    // Own task, so a cancelled caller cannot strand the queue
                    tokio::spawn(run_refresh(self.inner.clone()));
                    Admission::Wait(rx)
                }
            }
        };

        match admission {
            Admission::AlreadyFresh => self.inner.session.tokens().await,
            Admission::LoggedOut => None,
            // Sender dropped means the refresh task died: treat as failure
            Admission::Wait(rx) => rx.await.unwrap_or(None),
        }
    }

    #[instrument(skip(self))]
    async fn force_logout(&self) {
        {
            let mut cycle = self.cycle();
            // A running refresh must discard its pair and fail its queue
            if cycle.state == RefreshState::Refreshing {
                cycle.revoked = true;
            } else {
                cycle.state = RefreshState::LoggedOut;
            }
        }
        if let Err(e) = self.inner.session.clear_tokens().await {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        self.inner.signals.emit(AuthSignal::Logout);
    }

    fn cycle(&self) -> std::sync::MutexGuard<'_, Cycle> {
        lock_cycle(&self.inner)
    }
}

fn lock_cycle(inner: &Inner) -> std::sync::MutexGuard<'_, Cycle> {
    inner.cycle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One refresh cycle: refresh, persist, then release the queue
async fn run_refresh(inner: Arc<Inner>) {
    let refreshed = match inner.session.refresh_token().await {
        None => {
            info!("No refresh token available, logging out");
            None
        }
        Some(refresh_token) => {
            inner.signals.emit(AuthSignal::RefreshNeeded);
            match inner.refresher.refresh(&refresh_token).await {
                // A forbidden logout during the refresh wins over the new pair
                Ok(_) if lock_cycle(&inner).revoked => {
                    info!("Discarding refreshed tokens after forbidden logout");
                    None
                }
                Ok(pair) => match inner.session.replace_tokens(pair).await {
                    Ok(tokens) => Some(tokens),
                    Err(e) => {
                        warn!(error = %e, "Failed to persist refreshed tokens");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Token refresh failed");
                    None
                }
            }
        }
    };

    // Revoked while persisting: clear what was just written
    let outcome = refreshed.filter(|_| !lock_cycle(&inner).revoked);

    if outcome.is_none() {
        if let Err(e) = inner.session.clear_tokens().await {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }

    let (outcome, revoked, waiters) = {
        let mut cycle = lock_cycle(&inner);
        // A revoke after this point still clears the tokens in force_logout
        let revoked = std::mem::take(&mut cycle.revoked);
        let outcome = outcome.filter(|_| !revoked);
        if outcome.is_some() {
            cycle.state = RefreshState::Idle;
            cycle.generation += 1;
        } else {
            cycle.state = RefreshState::LoggedOut;
        }
        (outcome, revoked, std::mem::take(&mut cycle.waiters))
    };

    match &outcome {
        Some(_) => info!(replaying = waiters.len(), "Token refresh succeeded"),
        // force_logout already signalled
        None if revoked => {}
        None => inner.signals.emit(AuthSignal::Logout),
    }

    for waiter in waiters {
        // The caller may have gone away; nothing to deliver then
        let _ = waiter.send(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeRefresher {
        calls: AtomicUsize,
        succeed: bool,
        delay: Duration,
    }

    impl FakeRefresher {
        fn new(succeed: bool) -> Arc<Self> {
            Self::with_delay(succeed, Duration::from_millis(20))
        }

        fn with_delay(succeed: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(refresh_token, "old-refresh");
            tokio::time::sleep(self.delay).await;
            if self.succeed {
                Ok(TokenPair::new("new-access".into(), "new-refresh".into()))
            } else {
                Err(Error::Unauthenticated {
                    message: "refresh token revoked".into(),
                })
            }
        }
    }

    struct Harness {
        interceptor: AuthInterceptor,
        storage: Arc<MemoryStorage>,
        refresher: Arc<FakeRefresher>,
        logouts: Arc<AtomicUsize>,
    }

    async fn harness(refresher: Arc<FakeRefresher>, tokens: Option<TokenPair>) -> Harness {
        let storage = Arc::new(match tokens {
            Some(t) => MemoryStorage::with_tokens(t),
            None => MemoryStorage::new(),
        });
        let session = Session::restore(storage.clone()).await.unwrap();
        let signals = Signals::new();
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        signals.subscribe(move |signal| {
            if signal == AuthSignal::Logout {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        Harness {
            interceptor: AuthInterceptor::new(session, refresher.clone(), signals),
            storage,
            refresher,
            logouts,
        }
    }

    fn old_pair() -> Option<TokenPair> {
        Some(TokenPair::new("old-access".into(), "old-refresh".into()))
    }

    fn expired() -> Error {
        Error::Unauthenticated {
            message: "jwt expired".into(),
        }
    }

    /// Succeeds only with the refreshed access token
    async fn needs_new_token(token: Option<String>) -> Result<String> {
        match token.as_deref() {
            Some("new-access") => Ok("payload".to_string()),
            _ => Err(expired()),
        }
    }

    #[tokio::test]
    async fn passes_through_successful_calls() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;
        let token = h
            .interceptor
            .execute(|token| async move { Ok(token) })
            .await
            .unwrap();
        assert_eq!(token.as_deref(), Some("old-access"));
        assert_eq!(h.refresher.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_rejections_share_one_refresh() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interceptor = h.interceptor.clone();
                tokio::spawn(async move { interceptor.execute(needs_new_token).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "payload");
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.interceptor.state(), RefreshState::Idle);

        let stored = h.storage.stored_tokens().unwrap();
        assert_eq!(stored.access_token(), "new-access");
        assert_eq!(stored.refresh_token(), "new-refresh");
    }

    #[tokio::test]
    async fn failed_refresh_fails_everyone_and_logs_out_once() {
        let h = harness(FakeRefresher::new(false), old_pair()).await;

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let interceptor = h.interceptor.clone();
                tokio::spawn(async move { interceptor.execute(needs_new_token).await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Unauthenticated { .. }));
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
        assert!(h.storage.stored_tokens().is_none());
        assert!(h.interceptor.session().tokens().await.is_none());
        assert_eq!(h.interceptor.state(), RefreshState::LoggedOut);
    }

    #[tokio::test]
    async fn forbidden_logs_out_without_refreshing() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;

        let err = h
            .interceptor
            .execute(|_| async {
                Err::<(), _>(Error::Forbidden {
                    message: "not a team member".into(),
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden { .. }));
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
        assert!(h.storage.stored_tokens().is_none());
        assert_eq!(h.interceptor.state(), RefreshState::LoggedOut);
    }

    #[tokio::test]
    async fn forbidden_during_refresh_stays_logged_out() {
        let h = harness(
            FakeRefresher::with_delay(true, Duration::from_millis(100)),
            old_pair(),
        )
        .await;

        let spawn_expired = || {
            let interceptor = h.interceptor.clone();
            tokio::spawn(async move { interceptor.execute(needs_new_token).await })
        };
        let first = spawn_expired();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.interceptor.state(), RefreshState::Refreshing);
        let queued = spawn_expired();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = h
            .interceptor
            .execute(|_| async {
                Err::<(), _>(Error::Forbidden {
                    message: "removed from team".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));

        for handle in [first, queued] {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Unauthenticated { .. }));
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
        assert!(h.storage.stored_tokens().is_none());
        assert!(h.interceptor.session().tokens().await.is_none());
        assert_eq!(h.interceptor.state(), RefreshState::LoggedOut);

        // The discarded pair is not used by later calls either
        let later = h.interceptor.execute(needs_new_token).await;
        assert!(later.is_err());
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn forbidden_replay_logs_out_once_while_others_succeed() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;

        let ok = {
            let interceptor = h.interceptor.clone();
            tokio::spawn(async move { interceptor.execute(needs_new_token).await })
        };
        let denied = h
            .interceptor
            .execute(|token| async move {
                match token.as_deref() {
                    Some("new-access") => Err::<(), _>(Error::Forbidden {
                        message: "not a team member".into(),
                    }),
                    _ => Err(expired()),
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(denied, Error::Forbidden { .. }));
        assert_eq!(ok.await.unwrap().unwrap(), "payload");
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
        assert!(h.storage.stored_tokens().is_none());
        assert_eq!(h.interceptor.state(), RefreshState::LoggedOut);
    }

    #[tokio::test]
    async fn missing_refresh_token_goes_straight_to_logout() {
        let h = harness(FakeRefresher::new(true), None).await;

        let err = h.interceptor.execute(needs_new_token).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);

        // Already logged out: no second signal
        let _ = h.interceptor.execute(needs_new_token).await;
        assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replay_errors_for_other_reasons_surface_normally() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;

        let err = h
            .interceptor
            .execute(|token| async move {
                match token.as_deref() {
                    Some("new-access") => Err::<(), _>(Error::GraphQl {
                        code: "INTERNAL_SERVER_ERROR".into(),
                        message: "database down".into(),
                    }),
                    _ => Err(expired()),
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::GraphQl { .. }));
        assert_eq!(h.logouts.load(Ordering::SeqCst), 0);
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn replay_is_attempted_only_once() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let err = h
            .interceptor
            .execute(move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(expired())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SessionExpired));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn queued_requests_replay_in_order() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;
        let replays = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let interceptor = h.interceptor.clone();
                let replays = replays.clone();
                tokio::spawn(async move {
                    interceptor
                        .execute(|token| {
                            let replays = replays.clone();
                            async move {
                                if token.as_deref() == Some("new-access") {
                                    replays.lock().unwrap().push(i);
                                    Ok(i)
                                } else {
                                    Err(expired())
                                }
                            }
                        })
                        .await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), i);
        }
        assert_eq!(*replays.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn late_rejection_of_old_token_does_not_refresh_again() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;

        let slow = {
            let interceptor = h.interceptor.clone();
            tokio::spawn(async move {
                interceptor
                    .execute(|token| async move {
                        if token.as_deref() == Some("new-access") {
                            return Ok("slow");
                        }
                        // Rejection arrives after the refresh has finished
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        Err(expired())
                    })
                    .await
            })
        };

        let fast = h.interceptor.execute(needs_new_token).await.unwrap();
        assert_eq!(fast, "payload");
        assert_eq!(slow.await.unwrap().unwrap(), "slow");
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_emits_refresh_needed() {
        let h = harness(FakeRefresher::new(true), old_pair()).await;
        let mut rx = h.interceptor.signals().channel();

        h.interceptor.execute(needs_new_token).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AuthSignal::RefreshNeeded);
    }

    #[tokio::test]
    async fn reset_allows_a_new_cycle_after_logout() {
        let h = harness(FakeRefresher::new(true), None).await;
        let _ = h.interceptor.execute(needs_new_token).await;
        assert_eq!(h.interceptor.state(), RefreshState::LoggedOut);

        h.interceptor.reset();
        assert_eq!(h.interceptor.state(), RefreshState::Idle);
    }
}
