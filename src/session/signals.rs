//! Process-wide auth notifications as an explicit publish/subscribe API.
//!
//! Callbacks are registered on a [`Signals`] instance that is injected into
//! the interceptor; the application shell decides what a logout means.
//! Channel subscribers are also supported for async consumers.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// Tokens were cleared; the user must sign in again
    Logout,
    /// An access token was rejected and a refresh cycle started
    RefreshNeeded,
}

impl AuthSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthSignal::Logout => "logout",
            AuthSignal::RefreshNeeded => "refresh-needed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(AuthSignal) + Send + Sync>;

#[derive(Clone)]
pub struct Signals {
    inner: Arc<SignalsInner>,
}

struct SignalsInner {
    callbacks: Mutex<Registry>,
    sender: broadcast::Sender<AuthSignal>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(SubscriptionId, Callback)>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SignalsInner {
                callbacks: Mutex::new(Registry::default()),
                sender,
            }),
        }
    }

    /// Register a callback invoked synchronously on every emitted signal
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(AuthSignal) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.entries.push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let before = registry.entries.len();
        registry.entries.retain(|(entry, _)| *entry != id);
        registry.entries.len() != before
    }

    /// Receive signals on a channel instead of a callback
    pub fn channel(&self) -> broadcast::Receiver<AuthSignal> {
        self.inner.sender.subscribe()
    }

    pub fn emit(&self, signal: AuthSignal) {
        debug!(signal = signal.as_str(), "Emitting auth signal");

        // Clone out so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .registry()
            .entries
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(signal);
        }

        // Only fails when nobody listens on the channel
        let _ = self.inner.sender.send(signal);
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_receive_emitted_signals() {
        let signals = Signals::new();
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        signals.subscribe(move |signal| {
            if signal == AuthSignal::Logout {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        signals.emit(AuthSignal::RefreshNeeded);
        signals.emit(AuthSignal::Logout);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_callbacks_are_not_called() {
        let signals = Signals::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = signals.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(signals.unsubscribe(id));
        assert!(!signals.unsubscribe(id));
        signals.emit(AuthSignal::Logout);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn channel_subscribers_receive_signals() {
        let signals = Signals::new();
        let mut rx = signals.channel();
        signals.emit(AuthSignal::Logout);
        assert_eq!(rx.recv().await.unwrap(), AuthSignal::Logout);
    }

    #[test]
    fn emit_without_listeners_is_fine() {
        Signals::new().emit(AuthSignal::RefreshNeeded);
    }
}
