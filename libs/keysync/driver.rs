//! Driver trait implemented by the owner of a synchronization pipeline.

use crate::error::SyncError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;

/// Outcome of a successful reducer application.
///
/// Expected protocol conditions that discard an update (keepalives,
/// stale duplicates) are `Ignored`, not errors. Detected inconsistencies
/// are returned as `Err(SyncError)` and drive reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// The update mutated the state; a state-changed event fires.
    Applied,
    /// The update was recognized and deliberately discarded.
    Ignored,
}

/// Defines one family of synchronization domains: how fresh state is built,
/// how updates fold into it, and where resulting events go.
///
/// The synchronizer calls `initialize` the first time a key is seen and on
/// every reinitialization; `reduce` runs on the key's single consumer task,
/// so implementations may mutate state freely without further locking.
#[async_trait]
pub trait SyncDriver: Send + Sync + 'static {
    /// Identifies independent synchronization domains (one per instrument).
    type Key: Eq + Hash + Clone + Send + Sync + Debug + 'static;
    /// Caller-defined mutable state (for example, an order book).
    type State: Send + 'static;
    /// One streamed delta.
    type Update: Send + 'static;

    /// Build a fresh state for `key`, typically by fetching a snapshot over
    /// REST. Incoming updates buffer while this is in flight.
    async fn initialize(&self, key: &Self::Key) -> Result<Self::State, SyncError>;

    /// Fold one update into the state.
    fn reduce(
        &self,
        key: &Self::Key,
        state: &mut Self::State,
        update: Self::Update,
    ) -> Result<Reduction, SyncError>;

    /// Fired after every `Applied` reduction with the post-update state.
    fn on_synchronized(&self, key: &Self::Key, state: &Self::State);

    /// Fired when the reducer or initializer reports an error. The
    /// synchronizer reinitializes the key afterwards on its own.
    fn on_error(&self, _key: &Self::Key, _error: &SyncError) {}
}
