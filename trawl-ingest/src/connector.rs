//! Bounded connectors
//!
//! Storage collaborators advertise how many concurrent operations they can
//! absorb. Pipelines size their batches from that figure.

/// Share of a collaborator's pool a single pipeline may occupy, in tenths
const POOL_SHARE_TENTHS: usize = 9;

/// A collaborator with a bounded number of concurrent connections
pub trait BoundedConnector: Send + Sync {
    /// Maximum number of operations that may safely run at once
    fn pool_size(&self) -> usize;
}

/// Derives a batch size that leaves headroom in the collaborator's pool
///
/// Returns `floor(0.9 * pool_size)`, never less than 1. Whole tens and the
/// remainder are scaled apart so the result cannot overflow.
pub fn derive_batch_size(pool_size: usize) -> usize {
    let tens = pool_size / 10 * POOL_SHARE_TENTHS;
    let rest = pool_size % 10 * POOL_SHARE_TENTHS / 10;
    (tens + rest).max(1)
}
