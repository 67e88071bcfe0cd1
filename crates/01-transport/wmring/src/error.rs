//! Error handling helpers for the ring crate.
//!
//! The error surface stays small: construction failures and caller misuse.
//! Backpressure ("ring full") and starvation ("nothing to read") are ordinary
//! outcomes and are reported through `Option`/empty grants instead.

use thiserror::Error;

/// Convenience result alias for fallible ring operations.
pub type RingResult<T, E = RingError> = Result<T, E>;

/// Errors surfaced by the ring, its backing region and the staging buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    /// Requested capacity is zero or too large to address.
    #[error("ring capacity {requested} must be between 1 and {maximum} bytes")]
    InvalidCapacity { requested: usize, maximum: usize },

    /// Allocation of the backing region failed for the given size/alignment pair.
    #[error("failed to allocate region of {size} bytes aligned to {alignment}")]
    AllocationFailed { size: usize, alignment: usize },

    /// A ring or scenario configuration is internally inconsistent.
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(&'static str),

    /// A claim was requested with a size the ring can never satisfy.
    #[error("claim of {requested} bytes is invalid for a ring of {capacity} bytes")]
    InvalidClaim { requested: usize, capacity: usize },

    /// A system call failed while building a double mapping.
    #[error("failed to mirror {size} bytes: {op} failed with errno {errno}")]
    MirrorFailed {
        size: usize,
        op: &'static str,
        errno: i32,
    },

    /// The consumer tried to retire more bytes than the last read offered.
    #[error("cannot consume {requested} bytes, only {available} were made available")]
    OverConsume { requested: usize, available: usize },
}
