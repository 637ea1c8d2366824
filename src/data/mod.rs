//! Dataset definitions for the Internet Health Report API
//!
//! Each IHR dataset (hegemony, forwarding alarms, disconnection events) is
//! described by a [`Dataset`] value: its endpoint, the filter keys it accepts,
//! how multi-valued filters are expanded into queries, and the names of its
//! time-range parameters. The fetch engine is generic over these values, so
//! adding a dataset means adding a constructor here, not another client.

use serde_json::Value;

/// A single decoded result from the API. The record schema varies per dataset
/// and is passed through untouched.
pub type Record = Value;

/// The records decoded from one page of one query.
pub type Batch = Vec<Record>;

/// How a dataset endpoint accepts multi-valued filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// The endpoint takes one value per filter key; multi-valued filters are
    /// expanded into one query per combination.
    PerCombination,
    /// The endpoint takes comma-joined value lists; multi-valued filters are
    /// serialized into a single query.
    Batched,
}

/// Static description of one IHR dataset endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    /// Short name, used as the cache key prefix
    pub name: &'static str,
    /// Default API endpoint URL
    pub endpoint: &'static str,
    /// Filter keys the endpoint accepts, in query order
    pub filter_keys: &'static [&'static str],
    /// How multi-valued filters are expanded
    pub mode: QueryMode,
    /// Query parameter names for the start and end of the time range
    pub time_keys: [&'static str; 2],
    /// Whether at least one filter dimension must be set
    pub requires_filter: bool,
}

impl Dataset {
    /// AS hegemony (inter-AS dependency) scores.
    ///
    /// Filterable by `originasn` (the AS whose dependencies are reported;
    /// 0 for global hegemony) and `asn` (restrict to given dependencies).
    /// At least one of the two must be set.
    pub fn hegemony() -> Self {
        Self {
            name: "hegemony",
            endpoint: "https://ihr.iijlab.net/ihr/api/hegemony/",
            filter_keys: &["originasn", "asn"],
            mode: QueryMode::PerCombination,
            time_keys: ["timebin__gte", "timebin__lte"],
            requires_filter: true,
        }
    }

    /// Forwarding anomaly alarms, filterable by `asn` (required).
    pub fn forwarding() -> Self {
        Self {
            name: "forwarding",
            endpoint: "https://ihr.iijlab.net/ihr/api/forwarding/",
            filter_keys: &["asn"],
            mode: QueryMode::PerCombination,
            time_keys: ["timebin__gte", "timebin__lte"],
            requires_filter: true,
        }
    }

    /// Network disconnection events, filterable by `streamname`.
    ///
    /// The filter is optional: an unfiltered query returns events for all
    /// streams in the time range.
    pub fn disconnect() -> Self {
        Self {
            name: "disconnect",
            endpoint: "https://ihr.iijlab.net/ihr/api/disco_events/",
            filter_keys: &["streamname"],
            mode: QueryMode::PerCombination,
            time_keys: ["starttime__gte", "endtime__lte"],
            requires_filter: false,
        }
    }
}
