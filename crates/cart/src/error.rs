//! Synchronizer-level error handling.
//!
//! Every error here is terminal at the synchronizer boundary: logged at the
//! call site, surfaced as an `Err` the caller may choose to show, never
//! retried, never fatal to the process. The local cached view stays whatever
//! it last was.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A mutating operation was invoked with no established identity.
    /// Anonymous carts are not persisted; the operation is skipped.
    #[error("no identity established")]
    IdentityMissing,

    /// The line violates an add constraint (zero quantity, negative price).
    #[error("invalid line: {0}")]
    InvalidLine(String),

    /// The document store reported a failure (network, permission, quota).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for cart operations.
pub type Result<T> = std::result::Result<T, SyncError>;
