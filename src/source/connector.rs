//! HTTP connector for the HIS report API.
//!
//! One GET per feed, no retries. A failed feed is returned as an error
//! value next to the successful ones; it never aborts the cycle.

use crate::error::{FeedError, FetchError};
use crate::models::{FeedId, Row, Table};
use crate::normalize::{normalize, validate};
use crate::source::feeds::{DateRange, Feed};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings for the connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base URL all feed paths are appended to.
    pub base_url: String,
    /// Request timeout. `None` blocks until the server answers.
    pub timeout_seconds: Option<u64>,
}

/// Client for the HIS feeds.
#[derive(Debug, Clone)]
pub struct Connector {
    client: reqwest::Client,
    base_url: String,
}

/// Result of loading one feed.
#[derive(Debug)]
pub struct FeedLoad {
    pub feed: FeedId,
    pub url: String,
    pub result: Result<Table, FeedError>,
}

impl Connector {
    /// Create a connector with its own HTTP client.
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create a connector around an existing client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one feed and normalize its payload.
    pub async fn fetch(&self, feed: &Feed, range: Option<DateRange>) -> Result<Table, FetchError> {
        let url = feed.url(&self.base_url);
        debug!("GET {} (range: {:?})", url, range);

        let mut request = self.client.get(&url);
        if let Some(range) = range {
            request = request.query(&range.query());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        let body = response.text().await?;
        decode_response(status, body)
    }

    /// Fetch one feed for the reporting day and check its schema.
    pub async fn load(&self, feed: &Feed, today: NaiveDate) -> FeedLoad {
        let url = feed.url(&self.base_url);
        let range = feed.window.resolve(today);

        let result = match self.fetch(feed, range).await {
            Ok(table) => validate(&table, feed.required)
                .map(|_| table)
                .map_err(FeedError::from),
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(table) => info!("{}: {} rows", feed.id, table.row_count()),
            Err(e) => {
                warn!("{}: {}", feed.id, e);
                if let FeedError::Fetch(FetchError::InvalidPayload(body)) = e {
                    debug!("{} response body: {}", feed.id, body);
                }
            }
        }

        FeedLoad {
            feed: feed.id,
            url,
            result,
        }
    }

    /// Load every feed, concurrently or one after another.
    ///
    /// Results come back in the order of `feeds` regardless of which
    /// request finished first.
    pub async fn load_all(
        &self,
        feeds: &[&Feed],
        today: NaiveDate,
        parallel: bool,
        progress: &ProgressBar,
    ) -> Vec<FeedLoad> {
        if parallel {
            join_all(feeds.iter().map(|feed| async move {
                let load = self.load(feed, today).await;
                progress.inc(1);
                load
            }))
            .await
        } else {
            let mut loads = Vec::with_capacity(feeds.len());
            for feed in feeds {
                loads.push(self.load(feed, today).await);
                progress.inc(1);
            }
            loads
        }
    }
}

/// Interpret a 2xx response body as a feed payload.
pub fn decode_response(status: u16, body: String) -> Result<Table, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::HttpStatus(status));
    }

    match parse_rows(&body) {
        Some(rows) => Ok(normalize(rows)),
        None => Err(FetchError::InvalidPayload(body)),
    }
}

/// Parse a JSON array of flat objects; `None` for any other shape.
fn parse_rows(body: &str) -> Option<Vec<Row>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let items = match value {
        Value::Array(items) => items,
        _ => return None,
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) if row.values().all(is_scalar) => Some(row),
            _ => None,
        })
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Progress bar counting completed feeds; hidden when `show` is false.
pub fn feed_progress(len: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} feeds")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
