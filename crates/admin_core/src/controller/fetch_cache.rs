//! Last known entity list plus the loading flag shown by the page.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use client_core::{EntityService, ServiceError};
use shared::domain::Entity;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// `items` is not authoritative while `is_loading` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub items: Vec<Entity>,
    pub is_loading: bool,
}

pub struct FetchCache {
    service: Arc<dyn EntityService>,
    state: watch::Sender<FetchState>,
    // FIFO: queued refetches run one at a time in the order they were issued.
    fetch_gate: Mutex<()>,
    // Only touched inside `state` updates, which serialize them.
    pending: AtomicUsize,
    held: AtomicUsize,
    owned: AtomicBool,
}

impl FetchCache {
    pub fn new(service: Arc<dyn EntityService>) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            service,
            state,
            fetch_gate: Mutex::new(()),
            pending: AtomicUsize::new(0),
            held: AtomicUsize::new(0),
            owned: AtomicBool::new(false),
        }
    }

    /// Reloads the list from the service, returning the number of items loaded.
    ///
    /// On failure the previous items are kept and the error is returned as is.
    pub async fn refetch(&self) -> Result<usize, ServiceError> {
        let in_flight = InFlight::enter(self);
        let _gate = self.fetch_gate.lock().await;

        let result = self.service.fetch_all().await;
        let outcome = match result {
            Ok(items) => {
                let count = items.len();
                self.state.send_modify(|state| state.items = items);
                info!(count, "entity list refreshed");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "entity list refresh failed; keeping previous items");
                Err(err)
            }
        };

        drop(in_flight);
        outcome
    }

    /// Flips the loading flag regardless of any fetch in flight.
    ///
    /// A flag raised this way is left alone by [`LoadingGuard`]s.
    pub fn toggle_loading(&self) -> bool {
        let mut is_loading = false;
        self.state.send_modify(|state| {
            state.is_loading = !state.is_loading;
            self.owned.store(false, Ordering::Relaxed);
            is_loading = state.is_loading;
        });
        debug!(is_loading, "loading flag toggled");
        is_loading
    }

    /// Raises the loading flag until the returned guard is dropped.
    ///
    /// Refetches settling meanwhile keep the flag raised; it is lowered once
    /// the last guard is gone and no fetch is pending.
    pub fn hold_loading(&self) -> LoadingGuard<'_> {
        let mut raised = false;
        self.state.send_if_modified(|state| {
            self.held.fetch_add(1, Ordering::Relaxed);
            if state.is_loading {
                return false;
            }
            state.is_loading = true;
            self.owned.store(true, Ordering::Relaxed);
            raised = true;
            true
        });
        LoadingGuard {
            cache: self,
            raised,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn items(&self) -> Vec<Entity> {
        self.state.borrow().items.clone()
    }

    pub fn snapshot(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }
}

/// Counts a refetch as pending from issue until settlement, including while queued.
struct InFlight<'a> {
    cache: &'a FetchCache,
}

impl<'a> InFlight<'a> {
    fn enter(cache: &'a FetchCache) -> Self {
        cache.state.send_if_modified(|state| {
            cache.pending.fetch_add(1, Ordering::Relaxed);
            cache.owned.store(true, Ordering::Relaxed);
            !std::mem::replace(&mut state.is_loading, true)
        });
        Self { cache }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let cache = self.cache;
        cache.state.send_if_modified(|state| {
            let remaining = cache.pending.fetch_sub(1, Ordering::Relaxed) - 1;
            if remaining > 0 || cache.held.load(Ordering::Relaxed) > 0 || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            cache.owned.store(false, Ordering::Relaxed);
            true
        });
    }
}

/// Keeps the loading flag raised; see [`FetchCache::hold_loading`].
pub struct LoadingGuard<'a> {
    cache: &'a FetchCache,
    raised: bool,
}

impl LoadingGuard<'_> {
    /// Whether this guard found the flag lowered and raised it.
    pub fn raised(&self) -> bool {
        self.raised
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let cache = self.cache;
        cache.state.send_if_modified(|state| {
            let remaining = cache.held.fetch_sub(1, Ordering::Relaxed) - 1;
            if remaining > 0
                || cache.pending.load(Ordering::Relaxed) > 0
                || !cache.owned.load(Ordering::Relaxed)
                || !state.is_loading
            {
                return false;
            }
            state.is_loading = false;
            cache.owned.store(false, Ordering::Relaxed);
            true
        });
    }
}

#[cfg(test)]
#[path = "tests/fetch_cache_tests.rs"]
mod tests;
