//! Command-line interface parsing for the IHR client
//!
//! This module defines the `ihr` command and its per-dataset subcommands
//! using clap, plus parsing of the time-range arguments, which accept either
//! plain dates or full RFC 3339 timestamps.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::fetch::DEFAULT_WORKERS;
use crate::query::TimeRange;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The time argument is not in a recognized format
    #[error("invalid time '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidTime(String),
}

/// Fetch Internet Health Report datasets
#[derive(Parser, Debug)]
#[command(name = "ihr")]
#[command(about = "Fetch Internet Health Report datasets with pagination and caching")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every dataset subcommand
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Start of the time range (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub start: String,

    /// End of the time range (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub end: String,

    /// Address family (4 or 6)
    #[arg(long, default_value_t = 4)]
    pub af: u8,

    /// Disable the on-disk result cache
    #[arg(long)]
    pub no_cache: bool,

    /// Directory for cached results (defaults to the user cache directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Override the API endpoint URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Maximum number of concurrent page downloads
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
}

impl CommonArgs {
    /// Parses the start/end arguments into a [`TimeRange`].
    pub fn time_range(&self) -> Result<TimeRange, CliError> {
        Ok(TimeRange::new(
            parse_time_arg(&self.start)?,
            parse_time_arg(&self.end)?,
        ))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch AS hegemony (inter-AS dependency) scores
    Hegemony {
        #[command(flatten)]
        common: CommonArgs,

        /// Origin ASN of interest (repeatable); 0 for global hegemony
        #[arg(long = "origin-asn", value_name = "ASN")]
        origin_asns: Vec<u32>,

        /// Restrict results to dependencies on this ASN (repeatable)
        #[arg(long = "asn", value_name = "ASN")]
        asns: Vec<u32>,
    },
    /// Fetch forwarding anomaly alarms
    Forwarding {
        #[command(flatten)]
        common: CommonArgs,

        /// ASN of interest (repeatable)
        #[arg(long = "asn", value_name = "ASN")]
        asns: Vec<u32>,
    },
    /// Fetch network disconnection events
    Disconnect {
        #[command(flatten)]
        common: CommonArgs,

        /// Stream name of interest, e.g. a country code (repeatable)
        #[arg(long = "stream", value_name = "NAME")]
        streams: Vec<String>,
    },
}

/// Parses a time argument into a UTC timestamp.
///
/// Accepts RFC 3339 (`2018-09-15T12:00:00Z`), a bare datetime interpreted as
/// UTC (`2018-09-15T12:00:00`), or a date (`2018-09-15`, meaning midnight).
pub fn parse_time_arg(s: &str) -> Result<DateTime<Utc>, CliError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    Err(CliError::InvalidTime(s.to_string()))
}
