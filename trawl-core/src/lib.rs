//! Trawl Core
//!
//! Core types shared by the Trawl ingestion crates.
//!
//! This crate contains the domain types only: the unit of ingestion work and
//! the records fetched from the upstream API and persisted by the ingester.

pub mod domain;
