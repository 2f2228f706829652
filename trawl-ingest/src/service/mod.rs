//! Service layer
//!
//! Services contain the ingestion use cases. They wire repositories,
//! upstream collaborators and failure sinks into pipeline runs: crawling
//! labeled tweets and their authors, bulk loading CSV exports, and repairing
//! tweets whose author is unknown.

mod author_repair;
mod csv_loader;
mod tweet_crawl;

#[cfg(test)]
mod testing;

// Re-export implementations
pub use author_repair::{AuthorRepairService, RepairReport, clean_text};
pub use csv_loader::{CsvLoaderService, parse_tweet_row};
pub use tweet_crawl::{TweetCrawlService, parse_labeled_row};
