//! Query planning: expanding filter criteria into fetch tasks
//!
//! The planner turns a [`FilterSpec`] (what the caller wants) into the list of
//! [`FetchTask`]s to run against a [`Dataset`] endpoint. Expansion is a pure
//! transformation with no I/O; validation failures surface here, before any
//! network request is made.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::{Dataset, QueryMode};

/// Error types for query planning
#[derive(Debug, Error)]
pub enum QueryError {
    /// The dataset requires a filter but none was supplied
    #[error("no usable filter values: '{dataset}' requires at least one of: {keys}")]
    InvalidQuery { dataset: &'static str, keys: String },
}

/// Inclusive time range for a retrieval, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start of the range (inclusive lower bound)
    pub start: DateTime<Utc>,
    /// End of the range (inclusive upper bound)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Filter criteria for one retrieval call.
///
/// Each dimension holds a set of values; an absent or empty dimension means
/// "do not filter on it". Values are kept in a sorted set so that two filter
/// sets built from the same values in different orders plan identical tasks
/// and derive identical cache keys.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    dims: BTreeMap<&'static str, BTreeSet<String>>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the values for one filter dimension, replacing any previous ones.
    /// An empty iterator leaves the dimension unset.
    pub fn set<I, V>(&mut self, key: &'static str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let set: BTreeSet<String> = values.into_iter().map(|v| v.to_string()).collect();
        if set.is_empty() {
            self.dims.remove(key);
        } else {
            self.dims.insert(key, set);
        }
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with<I, V>(mut self, key: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.set(key, values);
        self
    }

    fn get(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.dims.get(key).filter(|s| !s.is_empty())
    }
}

/// One logical query: a single filter combination to resolve to all its pages.
///
/// Tasks are created by [`plan`] and consumed by the fetcher; the cache key is
/// a deterministic function of the filter values, time range, and address
/// family, independent of how the caller ordered the input values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    dataset: &'static str,
    time_keys: [&'static str; 2],
    filters: BTreeMap<&'static str, Option<String>>,
    range: TimeRange,
    af: u8,
}

impl FetchTask {
    /// Deterministic cache key for this task: dataset name, every filter
    /// dimension in key order (unset dimensions included, with no value),
    /// time range, and address family.
    pub fn cache_key(&self) -> String {
        let mut key = String::from(self.dataset);
        for (name, value) in &self.filters {
            key.push('_');
            key.push_str(name);
            if let Some(v) = value {
                key.push_str(v);
            }
        }
        key.push_str(&format!(
            "_start{}_end{}_af{}",
            self.range.start.format("%Y%m%dT%H%M%SZ"),
            self.range.end.format("%Y%m%dT%H%M%SZ"),
            self.af
        ));
        key
    }

    /// Query parameters for one page of this task. Unset filter dimensions
    /// are omitted from the query string.
    pub fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (self.time_keys[0], self.range.start.to_rfc3339()),
            (self.time_keys[1], self.range.end.to_rfc3339()),
            ("af", self.af.to_string()),
            ("page", page.to_string()),
            ("format", "json".to_string()),
        ];
        for (name, value) in &self.filters {
            if let Some(v) = value {
                params.push((name, v.clone()));
            }
        }
        params
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dataset)?;
        for (name, value) in &self.filters {
            write!(f, " {}={}", name, value.as_deref().unwrap_or("*"))?;
        }
        Ok(())
    }
}

/// Expands filter criteria into the fetch tasks to run.
///
/// In [`QueryMode::PerCombination`] one task is produced per element of the
/// cross product of all set dimensions; in [`QueryMode::Batched`] a single
/// task carries each dimension's values comma-joined. Fails with
/// [`QueryError::InvalidQuery`] when the dataset requires a filter and every
/// dimension is unset.
pub fn plan(
    dataset: &Dataset,
    filters: &FilterSpec,
    range: TimeRange,
    af: u8,
) -> Result<Vec<FetchTask>, QueryError> {
    let any_set = dataset.filter_keys.iter().any(|k| filters.get(k).is_some());
    if dataset.requires_filter && !any_set {
        return Err(QueryError::InvalidQuery {
            dataset: dataset.name,
            keys: dataset.filter_keys.join(", "),
        });
    }

    let task = |combo: BTreeMap<&'static str, Option<String>>| FetchTask {
        dataset: dataset.name,
        time_keys: dataset.time_keys,
        filters: combo,
        range,
        af,
    };

    match dataset.mode {
        QueryMode::Batched => {
            let joined = dataset
                .filter_keys
                .iter()
                .map(|&key| {
                    let value = filters
                        .get(key)
                        .map(|set| set.iter().cloned().collect::<Vec<_>>().join(","));
                    (key, value)
                })
                .collect();
            Ok(vec![task(joined)])
        }
        QueryMode::PerCombination => {
            let mut combos: Vec<BTreeMap<&'static str, Option<String>>> = vec![BTreeMap::new()];
            for &key in dataset.filter_keys {
                let values: Vec<Option<String>> = match filters.get(key) {
                    Some(set) => set.iter().cloned().map(Some).collect(),
                    None => vec![None],
                };
                combos = combos
                    .into_iter()
                    .flat_map(|combo| {
                        values.iter().map(move |value| {
                            let mut next = combo.clone();
                            next.insert(key, value.clone());
                            next
                        })
                    })
                    .collect();
            }
            Ok(combos.into_iter().map(task).collect())
        }
    }
}
