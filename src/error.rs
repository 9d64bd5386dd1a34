//! Rust-level errors returned by allocation operations.
//!
//! These mirror what is recorded on the context's diagnostics channel; the
//! channel keeps the call path and message, the returned error lets callers
//! branch with `?` and `match`.

use flow_context_internals::BlockError;

use crate::registry::Address;

/// Why an allocation request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The memory could not be reserved.
    #[error("out of memory: failed to reserve {size} bytes")]
    OutOfMemory {
        /// The requested size in bytes
        size: usize,
    },
    /// The requested owner is not a live allocation of this context.
    #[error("owner {0:?} is not a live allocation")]
    UnknownOwner(Address),
    /// The block to operate on is not a live allocation of this context.
    #[error("{0:?} is not a live allocation")]
    UnknownBlock(Address),
}

impl From<BlockError> for AllocError {
    fn from(error: BlockError) -> Self {
        Self::OutOfMemory {
            size: error.requested_size(),
        }
    }
}
