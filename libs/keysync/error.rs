use thiserror::Error;

/// Errors surfaced by a synchronization domain.
///
/// Reducers distinguish expected protocol conditions (sequence gaps,
/// checksum mismatches) from programming-invariant violations
/// (`MissingState`), which are intended to be unreachable in correct
/// operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A delta's declared previous sequence does not match the last applied
    /// sequence — one or more messages were missed.
    #[error("sequence gap: update declares prev={prev} but last applied is {last}")]
    OutOfOrder { prev: u64, last: u64 },

    /// Wire checksum disagrees with the locally computed value.
    #[error("checksum mismatch: wire={wire} calculated={calculated}")]
    ChecksumMismatch { wire: i32, calculated: i32 },

    /// Reducer invoked with no state where the initializer should have
    /// populated one. Indicates a bug, not a protocol condition.
    #[error("reducer invoked with missing state")]
    MissingState,

    /// Initializer failed to produce a fresh state.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// The bounded per-key queue rejected an update.
    #[error("update queue overflow")]
    Overflow,
}
