//! Error types for pool operations.

use std::fmt;

/// Errors that can occur while constructing or reshaping a pool.
///
/// Capacity misses (`fill` on a full ring, `alloc` on an empty ring) are not
/// errors; they are reported through `None`/rejected-page return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// No memory available for pool storage or an initial fill.
    OutOfMemory,

    /// The ring failed a consistency check that should be unreachable under
    /// correct locking.
    Inconsistent,

    /// The background refill thread could not be started. The pool is not
    /// usable without a functioning refill path.
    WorkerSpawn,

    /// The requested pool length is larger than total system memory.
    InvalidLength,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Inconsistent => write!(f, "pool state inconsistent"),
            Self::WorkerSpawn => write!(f, "failed to spawn refill worker"),
            Self::InvalidLength => write!(f, "pool length exceeds total memory"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
