//! Rate-limit signal
//!
//! Decides whether a failed item operation means "slow down and retry the
//! batch" or "give up on this item".

use crate::error::IngestError;

/// Classification of a failed item operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The upstream is throttling us; the whole batch must be retried later
    Retryable,
    /// Only this item failed; record it and keep going
    Fatal,
}

/// Classifies an item error
///
/// Only the upstream "too many requests" condition is retryable. It is a
/// batch-level signal: the scheduler stops the current batch and retries it
/// on the next tick.
pub fn classify(err: &IngestError) -> Signal {
    match err {
        IngestError::RateLimited(_) => Signal::Retryable,
        IngestError::Upstream(client_err) if client_err.is_rate_limited() => Signal::Retryable,
        _ => Signal::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_client::ClientError;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = IngestError::Upstream(ClientError::api_error(429, "Too Many Requests"));
        assert_eq!(classify(&err), Signal::Retryable);
        assert_eq!(
            classify(&IngestError::RateLimited("window exhausted".to_string())),
            Signal::Retryable
        );
    }

    #[test]
    fn test_other_failures_are_fatal() {
        let not_found = IngestError::Upstream(ClientError::api_error(404, "No status found"));
        assert_eq!(classify(&not_found), Signal::Fatal);
        assert_eq!(classify(&IngestError::storage("duplicate key")), Signal::Fatal);
        assert_eq!(classify(&IngestError::Item("bad row".to_string())), Signal::Fatal);
    }
}
