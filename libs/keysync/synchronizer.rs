//! Per-key reducer pipeline with automatic reinitialization.

use crate::driver::{Reduction, SyncDriver};
use crate::error::SyncError;
use crate::state::{AtomicSyncState, SyncState};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default bound for each key's pending-update queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Polling delay while a key is initializing or its queue is idle, so that
/// externally requested reinitializations are picked up without busy-looping.
const POLL_DELAY: Duration = Duration::from_millis(100);

struct Entry<U> {
    tx: mpsc::Sender<U>,
    state: Arc<AtomicSyncState>,
    reinit_in_flight: Arc<AtomicBool>,
    consumer: JoinHandle<()>,
}

/// Generic per-key synchronization engine.
///
/// Each key owns a bounded queue and exactly one consumer task. Updates are
/// applied strictly in arrival order through the driver's reducer; reducer
/// errors flip the key into a buffering mode and rebuild its state via the
/// driver's initializer.
pub struct KeyedSynchronizer<D: SyncDriver> {
    driver: Arc<D>,
    entries: DashMap<D::Key, Entry<D::Update>>,
    capacity: usize,
}

impl<D: SyncDriver> KeyedSynchronizer<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self::with_capacity(driver, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(driver: Arc<D>, capacity: usize) -> Self {
        Self {
            driver,
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Enqueue an update for `key`, lazily creating its synchronization
    /// domain (and consumer task) on first sight.
    ///
    /// On queue overflow the incoming update is dropped and a resync is
    /// forced: an overflowing backlog means the consumer cannot keep up, and
    /// a fresh snapshot supersedes everything that was queued.
    pub fn push(&self, key: D::Key, update: D::Update) {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| self.spawn_entry(key.clone()));

        match entry.tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "[KeySync] queue overflow for {:?} (capacity {}), forcing resync",
                    key, self.capacity
                );
                request_reinit(&entry.state, &entry.reinit_in_flight, &key);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("[KeySync] consumer for {:?} is gone, update dropped", key);
            }
        }
    }

    /// Request a reinitialization for `key`.
    ///
    /// Reentrancy-protected: if one is already in flight the request is a
    /// no-op and `false` is returned. The key is flipped into buffering mode
    /// synchronously, before this call returns, so no update can be applied
    /// against stale state during the gap.
    pub fn reinitialize(&self, key: &D::Key) -> bool {
        match self.entries.get(key) {
            Some(entry) => request_reinit(&entry.state, &entry.reinit_in_flight, key),
            None => false,
        }
    }

    /// Current lifecycle state of a key, if it is being synchronized.
    pub fn state(&self, key: &D::Key) -> Option<SyncState> {
        self.entries.get(key).map(|e| e.state.get())
    }

    pub fn contains_key(&self, key: &D::Key) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tear down one key's domain (unsubscribe path).
    pub fn remove(&self, key: &D::Key) {
        if let Some((_, entry)) = self.entries.remove(key) {
            entry.consumer.abort();
            debug!("[KeySync] removed synchronization domain for {:?}", key);
        }
    }

    /// Tear down every domain (disconnect path).
    pub fn shutdown(&self) {
        self.entries.retain(|key, entry| {
            entry.consumer.abort();
            debug!("[KeySync] shut down synchronization domain for {:?}", key);
            false
        });
    }

    fn spawn_entry(&self, key: D::Key) -> Entry<D::Update> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let state = Arc::new(AtomicSyncState::new(SyncState::Initializing));
        // The initial build counts as an in-flight initialization so that a
        // concurrent reinitialize request collapses into it.
        let reinit_in_flight = Arc::new(AtomicBool::new(true));

        debug!("[KeySync] creating synchronization domain for {:?}", key);

        let consumer = tokio::spawn(run_consumer(
            Arc::clone(&self.driver),
            key,
            rx,
            Arc::clone(&state),
            Arc::clone(&reinit_in_flight),
        ));

        Entry {
            tx,
            state,
            reinit_in_flight,
            consumer,
        }
    }
}

/// Flip a key into buffering mode and mark an initialization as in flight.
/// Returns false (no-op) when one is already pending.
fn request_reinit<K: std::fmt::Debug>(
    state: &AtomicSyncState,
    in_flight: &AtomicBool,
    key: &K,
) -> bool {
    if in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        // Pause consumption before any asynchronous work can observe the key.
        state.set(SyncState::Initializing);
        debug!("[KeySync] reinitialization requested for {:?}", key);
        true
    } else {
        debug!("[KeySync] reinitialization already in flight for {:?}", key);
        false
    }
}

async fn run_consumer<D: SyncDriver>(
    driver: Arc<D>,
    key: D::Key,
    mut rx: mpsc::Receiver<D::Update>,
    state: Arc<AtomicSyncState>,
    reinit_in_flight: Arc<AtomicBool>,
) {
    let mut slot: Option<D::State> = None;
    // Holds an update that arrived just as a reinitialization was requested;
    // it is re-examined against the rebuilt state rather than discarded.
    let mut pending: Option<D::Update> = None;

    loop {
        // (Re)build state whenever the key is not synchronized. Updates keep
        // buffering in the bounded queue while this is in flight.
        while state.get() != SyncState::Synchronized {
            state.set(SyncState::Syncing);
            match driver.initialize(&key).await {
                Ok(fresh) => {
                    slot = Some(fresh);
                    state.set(SyncState::Synchronized);
                    reinit_in_flight.store(false, Ordering::Release);
                    info!("[KeySync] {:?} synchronized", key);
                }
                Err(e) => {
                    warn!("[KeySync] initialization failed for {:?}: {}", key, e);
                    driver.on_error(&key, &e);
                    if rx.is_closed() {
                        debug!("[KeySync] {:?} torn down during initialization", key);
                        return;
                    }
                    tokio::time::sleep(POLL_DELAY).await;
                }
            }
        }

        let update = match pending.take() {
            Some(u) => u,
            None => match tokio::time::timeout(POLL_DELAY, rx.recv()).await {
                Ok(Some(u)) => u,
                Ok(None) => {
                    debug!("[KeySync] queue closed for {:?}, consumer exiting", key);
                    return;
                }
                // Idle timeout: loop back so a reinitialization request made
                // while the queue was empty is honored promptly.
                Err(_) => continue,
            },
        };

        // A reinitialization may have been requested while this update was
        // queued; hold it and rebuild first.
        if state.get() != SyncState::Synchronized {
            pending = Some(update);
            continue;
        }

        let current = match slot.as_mut() {
            Some(s) => s,
            None => {
                // Unreachable in correct operation: Synchronized implies a
                // populated slot.
                driver.on_error(&key, &SyncError::MissingState);
                reinit_in_flight.store(true, Ordering::Release);
                state.set(SyncState::Initializing);
                continue;
            }
        };

        match driver.reduce(&key, current, update) {
            Ok(Reduction::Applied) => driver.on_synchronized(&key, current),
            Ok(Reduction::Ignored) => {}
            Err(e) => {
                warn!("[KeySync] reducer error for {:?}: {}", key, e);
                driver.on_error(&key, &e);
                reinit_in_flight.store(true, Ordering::Release);
                state.set(SyncState::Initializing);
                slot = None;
            }
        }
    }
}
