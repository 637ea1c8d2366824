//! `ihr` - fetch Internet Health Report datasets from the command line
//!
//! Records are printed to stdout as JSON lines; log output goes to stderr
//! and is controlled with `RUST_LOG`.

use std::error::Error;

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use ihr_client::cli::{Cli, Command};
use ihr_client::data::Dataset;
use ihr_client::fetch::Fetcher;
use ihr_client::query::FilterSpec;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (dataset, common, filters) = match cli.command {
        Command::Hegemony { common, origin_asns, asns } => (
            Dataset::hegemony(),
            common,
            FilterSpec::new()
                .with("originasn", origin_asns)
                .with("asn", asns),
        ),
        Command::Forwarding { common, asns } => (
            Dataset::forwarding(),
            common,
            FilterSpec::new().with("asn", asns),
        ),
        Command::Disconnect { common, streams } => (
            Dataset::disconnect(),
            common,
            FilterSpec::new().with("streamname", streams),
        ),
    };

    let range = common.time_range()?;

    let mut fetcher = Fetcher::new(dataset).with_workers(common.workers);
    if let Some(url) = &common.url {
        fetcher = fetcher.with_endpoint(url.clone());
    }
    if common.no_cache {
        fetcher = fetcher.without_cache();
    } else if let Some(dir) = &common.cache_dir {
        fetcher = fetcher.with_cache_dir(dir.clone());
    }

    let stream = fetcher.get_results(&filters, range, common.af)?;
    futures::pin_mut!(stream);
    while let Some(batch) = stream.next().await {
        for record in batch {
            println!("{record}");
        }
    }

    Ok(())
}
