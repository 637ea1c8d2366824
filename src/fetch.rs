//! Paginated fetch engine with transparent result caching
//!
//! Resolves each planned [`FetchTask`] to its complete, ordered sequence of
//! result batches (one batch per non-empty page). Cached tasks replay from
//! disk without a network call. For the rest, page 1 is requested up front;
//! once its envelope reveals the total page count, the remaining pages are
//! requested concurrently, bounded by a worker limit, and their batches are
//! yielded in page order regardless of arrival order.
//!
//! Individual page failures (transport errors, non-success statuses, bodies
//! that are not valid JSON) degrade to an empty envelope and a log line; they
//! never abort sibling pages or other tasks.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::data::{Batch, Dataset};
use crate::query::{plan, FetchTask, FilterSpec, QueryError, TimeRange};

/// Default number of concurrent page downloads
pub const DEFAULT_WORKERS: usize = 2;

/// The API's per-page response wrapper.
///
/// Every field is optional on the wire; a malformed or empty body decodes to
/// the default envelope, which carries no records and no next page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    /// Records on this page
    #[serde(default)]
    pub results: Batch,
    /// Total number of records across all pages
    #[serde(default)]
    pub count: u64,
    /// URL of the next page, absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

/// Total page count implied by a first-page envelope.
fn total_pages(count: u64, first_page_len: usize) -> u32 {
    count.div_ceil(first_page_len as u64) as u32
}

/// Issues page requests through a shared connection and concurrency limit.
#[derive(Debug, Clone)]
struct PageClient {
    client: Client,
    endpoint: String,
    limiter: Arc<Semaphore>,
}

impl PageClient {
    /// Starts the request for one page of one task. The request runs in the
    /// background as soon as a worker permit is available; the returned handle
    /// resolves to the page's envelope, empty on any failure.
    fn spawn_page(&self, task: &FetchTask, page: u32) -> JoinHandle<Envelope> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let limiter = Arc::clone(&self.limiter);
        let params = task.params(page);
        let label = task.to_string();
        tracing::info!(task = %label, page, "querying results");
        tokio::spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Envelope::default(),
            };
            fetch_page(&client, &endpoint, &params, &label, page).await
        })
    }
}

/// Performs one page request, converting every failure into an empty envelope.
async fn fetch_page(
    client: &Client,
    url: &str,
    params: &[(&'static str, String)],
    task: &str,
    page: u32,
) -> Envelope {
    let response = match client.get(url).query(&params).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(task, page, error = %e, "request failed");
            return Envelope::default();
        }
    };
    if !response.status().is_success() {
        tracing::warn!(task, page, status = %response.status(), "non-success response");
        return Envelope::default();
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(task, page, error = %e, "could not read response body");
            return Envelope::default();
        }
    };
    match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(task, page, error = %e, "could not decode response body");
            Envelope::default()
        }
    }
}

/// A task after the cache-check phase: either replayed from disk or pending
/// with its page-1 request already in flight.
enum Prepared {
    Cached(Vec<Batch>),
    Pending {
        task: FetchTask,
        key: String,
        first: JoinHandle<Envelope>,
    },
}

/// Resolves one prepared task to its ordered batches, writing the cache entry
/// once the whole page sequence has been collected.
async fn resolve(pages: PageClient, cache: Option<ResultCache>, prepared: Prepared) -> Vec<Batch> {
    let (task, key, first) = match prepared {
        Prepared::Cached(batches) => return batches,
        Prepared::Pending { task, key, first } => (task, key, first),
    };

    let first = first.await.unwrap_or_default();
    let mut collected: Vec<Batch> = Vec::new();

    if first.results.is_empty() {
        tracing::warn!(task = %task, "no results");
        return collected;
    }

    let first_page_len = first.results.len();
    let count = first.count;
    let has_next = first.next.is_some();
    collected.push(first.results);

    if has_next {
        let nb_pages = total_pages(count, first_page_len);
        tracing::info!(task = %task, remaining = nb_pages.saturating_sub(1), "more pages to query");
        let handles: Vec<(u32, JoinHandle<Envelope>)> = (2..=nb_pages)
            .map(|page| (page, pages.spawn_page(&task, page)))
            .collect();
        for (page, handle) in handles {
            let envelope = handle.await.unwrap_or_default();
            if envelope.results.is_empty() {
                tracing::warn!(task = %task, page, "no results");
            } else {
                collected.push(envelope.results);
            }
        }
    }

    // A task with zero records is never cached, so a later call re-checks
    // the API instead of replaying an empty entry.
    if let Some(cache) = &cache {
        if !collected.is_empty() {
            match cache.write(&key, &collected) {
                Ok(()) => tracing::info!(key = %key, "caching results to disk"),
                Err(e) => tracing::error!(key = %key, error = %e, "could not write cache entry"),
            }
        }
    }

    collected
}

/// Fetches a dataset's records, following pagination and caching results.
///
/// One fetcher serves one [`Dataset`]; the HTTP client, endpoint URL, cache
/// location, and concurrency limit are all explicit and overridable.
#[derive(Debug, Clone)]
pub struct Fetcher {
    dataset: Dataset,
    pages: PageClient,
    cache: Option<ResultCache>,
}

impl Fetcher {
    /// Creates a fetcher for the given dataset with a fresh HTTP client, the
    /// dataset's default endpoint, the user cache directory, and
    /// [`DEFAULT_WORKERS`] concurrent downloads.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            pages: PageClient {
                client: Client::new(),
                endpoint: dataset.endpoint.to_string(),
                limiter: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
            },
            cache: ResultCache::new(),
        }
    }

    /// Uses an existing HTTP client instead of constructing one.
    pub fn with_client(mut self, client: Client) -> Self {
        self.pages.client = client;
        self
    }

    /// Overrides the API endpoint URL.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.pages.endpoint = url.into();
        self
    }

    /// Sets the maximum number of concurrent page downloads (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pages.limiter = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    /// Stores cached results under the given directory.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache = Some(ResultCache::with_dir(dir));
        self
    }

    /// Disables the on-disk cache for both reads and writes.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Fetches all records matching the given filters and time range.
    ///
    /// Returns a finite, non-restartable stream of record batches, one per
    /// non-empty page, in page order within each task and in plan order
    /// across tasks. Consuming the stream to its end guarantees every
    /// available page was fetched or loaded from cache exactly once.
    ///
    /// Fails only with [`QueryError::InvalidQuery`], before any request is
    /// made; per-page failures are logged and shrink the stream instead of
    /// ending it early.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_results(
        &self,
        filters: &FilterSpec,
        range: TimeRange,
        af: u8,
    ) -> Result<impl Stream<Item = Batch> + Send, QueryError> {
        let tasks = plan(&self.dataset, filters, range, af)?;

        // Cache checks for every task come first; page-1 requests are fired
        // only for the misses, before any result is consumed.
        let mut prepared = Vec::with_capacity(tasks.len());
        for task in tasks {
            let key = task.cache_key();
            match self.cache.as_ref().and_then(|cache| cache.read(&key)) {
                Some(batches) => {
                    tracing::info!(task = %task, "loading results from cache");
                    prepared.push(Prepared::Cached(batches));
                }
                None => {
                    let first = self.pages.spawn_page(&task, 1);
                    prepared.push(Prepared::Pending { task, key, first });
                }
            }
        }

        let pages = self.pages.clone();
        let cache = self.cache.clone();
        Ok(stream::iter(prepared)
            .then(move |item| {
                let pages = pages.clone();
                let cache = cache.clone();
                async move { resolve(pages, cache, item).await }
            })
            .flat_map(stream::iter))
    }
}
