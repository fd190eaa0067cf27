//! OKX v5 brokerage adapter workspace.
//!
//! Re-exports the two workspace libraries: `keysync`, the generic keyed
//! snapshot-plus-delta synchronizer, and `okx`, the venue adapter built on
//! top of it.

pub use keysync;
pub use okx;
