//! Core domain types
//!
//! These types represent the records moved by the ingestion pipeline and are
//! shared between the upstream client (decodes them) and the ingester
//! (stores them).

pub mod tweet;
pub mod user;
pub mod work;
