//! Cache module for storing completed query results on disk
//!
//! This module provides a store that persists the full page sequence of a
//! resolved query to the filesystem, keyed by the query's cache key. There is
//! no expiry: a file that exists is treated as complete and valid, so repeated
//! retrievals with the same filters are served without touching the network.

mod store;

pub use store::ResultCache;
