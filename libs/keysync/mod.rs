//! # KeySync
//!
//! A generic per-key state synchronization engine for streamed data.
//!
//! Each key (for example, a traded instrument) owns an independent
//! synchronization domain: a caller-defined state object, a bounded update
//! queue, and a dedicated consumer task that applies updates sequentially
//! through a reducer. Sequence gaps or other inconsistencies detected by the
//! reducer trigger automatic reinitialization (a fresh state fetch) while
//! newly arriving updates keep buffering in the queue.
//!
//! ## Guarantees
//!
//! - **Per-key sequential**: updates for one key are applied in arrival order
//!   by a single consumer task
//! - **Cross-key parallel**: different keys progress independently
//! - **No stale application**: once a reinitialization is requested, no
//!   update is applied until the initializer has produced a fresh state
//! - **Idempotent reinitialization**: concurrent reinitialize requests for
//!   the same key collapse into a single initializer invocation

pub mod driver;
pub mod error;
pub mod state;
pub mod synchronizer;

pub use driver::{Reduction, SyncDriver};
pub use error::SyncError;
pub use state::{AtomicSyncState, SyncState};
pub use synchronizer::KeyedSynchronizer;

/// Type alias for Result with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
