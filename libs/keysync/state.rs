use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one synchronization domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Initializer pending or in flight; updates buffer, none are applied.
    Initializing,
    /// Fresh state being fetched; identical buffering semantics, kept
    /// distinct for observability.
    Syncing,
    /// Reducer is applying updates against a live state.
    Synchronized,
}

/// Lock-free storage for [`SyncState`], shared between the consumer task
/// and external callers requesting reinitialization.
#[derive(Debug)]
pub struct AtomicSyncState(AtomicU8);

impl AtomicSyncState {
    pub fn new(state: SyncState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> SyncState {
        match self.0.load(Ordering::Acquire) {
            0 => SyncState::Initializing,
            1 => SyncState::Syncing,
            _ => SyncState::Synchronized,
        }
    }

    #[inline]
    pub fn set(&self, state: SyncState) {
        self.0.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_synchronized(&self) -> bool {
        self.get() == SyncState::Synchronized
    }
}
