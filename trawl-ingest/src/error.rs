//! Error types for the ingestion pipeline
//!
//! Per-item errors are captured inside a batch and never reach the caller.
//! Rate limits are absorbed by the scheduler's retry loop. Everything else in
//! this enum is surfaced from a pipeline run.

use thiserror::Error;
use trawl_client::ClientError;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors produced while ingesting records
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upstream asked us to slow down
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    /// Upstream call failed; may or may not be a rate limit
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] ClientError),

    /// A single record could not be written
    #[error("Storage failure: {0}")]
    Storage(String),

    /// A single record could not be processed for any other reason
    #[error("Item failed: {0}")]
    Item(String),

    /// A caller passed an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The pipeline or scheduler was configured with unusable values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator failed in a way that makes continuing pointless
    #[error("Unrecoverable collaborator fault: {0}")]
    Unrecoverable(String),

    /// A batch kept hitting the rate limit past the configured retry budget
    #[error("Batch {batch_index} still rate limited after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Index of the stalled batch
        batch_index: usize,
        /// Number of attempts made
        attempts: u32,
    },

    /// The source enumerator could not produce the work list
    #[error("Source enumeration failed: {0}")]
    Source(String),
}

impl IngestError {
    /// Wrap a storage collaborator error, keeping its full context chain
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{:#}", err))
    }

    /// Whether this error must abort the whole run rather than one item
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable(_))
    }
}
