//! Client library for the Internet Health Report (IHR) API
//!
//! Fetches the IHR routing datasets (AS hegemony, forwarding alarms,
//! disconnection events) through one generic engine: filter criteria are
//! expanded into queries, pagination is followed to exhaustion with bounded
//! concurrency, and completed result sets are cached on disk so identical
//! retrievals never hit the network twice.

pub mod cache;
pub mod cli;
pub mod data;
pub mod fetch;
pub mod query;
