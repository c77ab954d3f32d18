//! Company news client.
//!
//! Optional collaborator: the pipeline proceeds without news when no API
//! key is configured.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::records::NewsItem;

/// Default news API base URL.
const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One article as returned by the company-news endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NewsArticle {
    url: String,
    headline: String,
    source: String,
    summary: String,
    /// Unix timestamp of publication
    datetime: i64,
}

/// Blocking company-news client.
pub struct NewsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    /// Create a new client against the default API base URL.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a new client against a custom base URL (useful for testing).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Fetch company news for `ticker` between two dates, newest first.
    ///
    /// Articles without a URL are discarded; the URL is the identity key in
    /// the cache.
    pub fn fetch_company_news(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        if ticker.is_empty() {
            return Err(DataError::InvalidSymbol("Empty ticker".to_string()));
        }
        if from > to {
            return Err(DataError::InvalidDateRange {
                start: from.to_string(),
                end: to.to_string(),
            });
        }

        let url = format!("{}/company-news", self.base_url);
        debug!(ticker, "news request");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", ticker.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("token", self.api_key.clone()),
            ])
            .send()
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "company-news returned HTTP {}",
                response.status()
            )));
        }

        let articles: Vec<NewsArticle> = response.json().map_err(DataError::Network)?;

        let mut items: Vec<NewsItem> = articles
            .into_iter()
            .filter(|article| !article.url.is_empty())
            .map(|article| NewsItem {
                url: article.url,
                ticker: ticker.to_string(),
                headline: article.headline,
                source: article.source,
                published_at: DateTime::<Utc>::from_timestamp(article.datetime, 0)
                    .unwrap_or_else(Utc::now),
                summary: article.summary,
            })
            .collect();

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(limit);
        Ok(items)
    }
}

impl std::fmt::Debug for NewsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
