//! Trawl Ingest
//!
//! Rate-adaptive batch ingestion of tweets and their authors.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Partition: Split the work list into fixed-size batches
//! - Scheduler: Tick-paced batch execution with retry-in-place on rate limits
//! - Pipeline: Source enumeration, batching and failure export for one run
//! - Repositories: PostgreSQL storage advertising its pool size
//! - Services: Tweet crawl, CSV bulk load and author repair
//!
//! A batch only advances once every item in it settled without a rate limit.
//! A rate-limited batch is retried on a later tick, launching only the
//! items that had not settled yet.

pub mod config;
pub mod connector;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod signal;
pub mod sink;
pub mod source;
pub mod upstream;

pub use config::Config;
pub use error::{IngestError, Result};
