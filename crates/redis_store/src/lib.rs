//! # Redis Store
//!
//! This crate provides the Redis-backed store of enriched recreation area records.

/// Redis client for the enrichment pass.
pub mod store;
pub use store::*;
