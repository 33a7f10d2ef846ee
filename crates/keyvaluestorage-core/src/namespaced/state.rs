//! Load state machine for the namespaced snapshot.

use crate::codec::Snapshot;
use crate::error::StorageError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Outcome broadcast to every caller coalesced onto one load.
pub(super) type LoadOutcome = std::result::Result<(), Arc<StorageError>>;

type Waiter = oneshot::Sender<LoadOutcome>;

pub(super) enum LoadState {
    Unloaded,
    /// A fetch is in flight; waiters are released in the order they queued.
    Loading { waiters: Vec<Waiter> },
    Loaded,
}

/// What a caller has to do before it may touch the snapshot.
pub(super) enum Ticket {
    /// Snapshot is loaded.
    Ready,
    /// Another caller is loading; wait for its outcome.
    Wait(oneshot::Receiver<LoadOutcome>),
    /// This caller owns the load.
    Load,
}

/// Everything guarded by the cache mutex.
pub(super) struct CacheState {
    pub load: LoadState,
    pub snapshot: Snapshot,
}

impl CacheState {
    pub fn new() -> Self {
        Self {
            load: LoadState::Unloaded,
            snapshot: Snapshot::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.load, LoadState::Loaded)
    }

    /// Inspect the load state, claiming the load if nobody has yet.
    pub fn ticket(&mut self) -> Ticket {
        match &mut self.load {
            LoadState::Loaded => Ticket::Ready,
            LoadState::Loading { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Ticket::Wait(rx)
            }
            LoadState::Unloaded => {
                self.load = LoadState::Loading {
                    waiters: Vec::new(),
                };
                Ticket::Load
            }
        }
    }

    /// Install the loaded snapshot and hand back the waiters to release.
    pub fn finish_load(&mut self, snapshot: Snapshot) -> Vec<Waiter> {
        self.snapshot = snapshot;
        self.take_waiters(LoadState::Loaded)
    }

    /// Revert to `Unloaded` so the next call retries, handing back the
    /// waiters to reject.
    pub fn fail_load(&mut self) -> Vec<Waiter> {
        self.take_waiters(LoadState::Unloaded)
    }

    fn take_waiters(&mut self, next: LoadState) -> Vec<Waiter> {
        match std::mem::replace(&mut self.load, next) {
            LoadState::Loading { waiters } => waiters,
            _ => Vec::new(),
        }
    }
}

/// Lock the cache state, recovering from poisoning.
///
/// Every critical section leaves the state consistent, so a panic elsewhere
/// while the lock was held does not invalidate it.
pub(super) fn lock(state: &Mutex<CacheState>) -> std::sync::MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reverts an in-flight load if the loading future is dropped before the
/// fetch resolves.
///
/// Dropping the queued senders wakes every waiter with a closed channel,
/// and they retry the load themselves.
pub(super) struct LoadGuard<'a> {
    state: &'a Mutex<CacheState>,
    armed: bool,
}

impl<'a> LoadGuard<'a> {
    pub fn new(state: &'a Mutex<CacheState>) -> Self {
        Self { state, armed: true }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let abandoned = lock(self.state).fail_load();
            drop(abandoned);
        }
    }
}
