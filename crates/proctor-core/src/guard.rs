//! Back-navigation guard for an active exam session.
//!
//! While engaged, the guard keeps a synthetic entry on top of the history so
//! a back event lands on it instead of leaving the exam. Each such attempt is
//! cancelled by re-pushing the entry and raises a notice for the front end.
//! Dropping the guard unsubscribes, so every exit path releases it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Notice shown when the candidate tries to leave mid-exam.
pub const LEAVE_NOTICE: &str = "You cannot go back during the exam. Please finish the exam.";

/// Handle identifying one back-navigation subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Callback invoked on a back-navigation event.
pub type BackListener = Arc<dyn Fn() + Send + Sync>;

/// A navigation history the guard can hold open.
pub trait History: Send + Sync {
    /// Push an entry that a back event will pop instead of leaving.
    fn push_entry(&self);

    fn subscribe(&self, listener: BackListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// In-process history: a depth counter plus a listener registry.
///
/// Front ends without a real browser history (the terminal runner, tests)
/// call [`InMemoryHistory::back`] for whatever their "leave" gesture is.
#[derive(Default)]
pub struct InMemoryHistory {
    depth: AtomicUsize,
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<SubscriptionId, BackListener>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop one entry and notify every subscriber.
    pub fn back(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        // Listeners may push entries; call them without holding the lock.
        let listeners: Vec<BackListener> = match self.listeners.lock() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener();
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl History for InMemoryHistory {
    fn push_entry(&self) {
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self, listener: BackListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut map) = self.listeners.lock() {
            map.insert(id, listener);
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut map) = self.listeners.lock() {
            map.remove(&id);
        }
    }
}

#[derive(Default)]
struct GuardState {
    attempts: AtomicUsize,
    pending: AtomicUsize,
    notify: Notify,
}

/// Scoped back-navigation guard. Released on drop.
pub struct NavigationGuard {
    history: Arc<dyn History>,
    subscription: SubscriptionId,
    state: Arc<GuardState>,
}

impl NavigationGuard {
    /// Push the synthetic entry and start intercepting back events.
    pub fn engage(history: Arc<dyn History>) -> Self {
        history.push_entry();
        let state = Arc::new(GuardState::default());

        let listener_state = Arc::clone(&state);
        let listener_history = Arc::downgrade(&history);
        let subscription = history.subscribe(Arc::new(move || {
            if let Some(history) = listener_history.upgrade() {
                history.push_entry();
            }
            listener_state.attempts.fetch_add(1, Ordering::SeqCst);
            listener_state.pending.fetch_add(1, Ordering::SeqCst);
            listener_state.notify.notify_one();
            tracing::info!("back navigation blocked during exam");
        }));

        tracing::debug!(?subscription, "navigation guard engaged");
        Self {
            history,
            subscription,
            state,
        }
    }

    /// Total back-navigation attempts intercepted.
    pub fn blocked_attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Take the pending notice, if a back event arrived since the last call.
    pub fn take_notice(&self) -> Option<&'static str> {
        let pending = self.state.pending.swap(0, Ordering::SeqCst);
        (pending > 0).then_some(LEAVE_NOTICE)
    }

    /// Wait for the next intercepted back event.
    pub async fn blocked(&self) {
        if self.state.pending.load(Ordering::SeqCst) > 0 {
            return;
        }
        self.state.notify.notified().await;
    }
}

impl Drop for NavigationGuard {
    fn drop(&mut self) {
        self.history.unsubscribe(self.subscription);
        tracing::debug!(subscription = ?self.subscription, "navigation guard released");
    }
}
