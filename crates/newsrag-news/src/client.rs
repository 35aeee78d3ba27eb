//! Paginated NewsAPI `/v2/everything` client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use newsrag_core::config::{api_key_from_env, NewsConfig};
use newsrag_core::corpus::CorpusSource;
use newsrag_core::error::{NewsRagError, Result};
use newsrag_core::types::RawDocument;

use crate::article::{dedup_by_url, NewsArticle};

/// One page of `/v2/everything`.
#[derive(Debug, Deserialize)]
pub struct NewsApiPage {
    pub status: String,
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What to do after reading a page.
#[derive(Debug, PartialEq)]
pub enum PageOutcome {
    /// A full page; ask for the next one.
    Continue(Vec<NewsArticle>),
    /// A short page; keep these and stop.
    Last(Vec<NewsArticle>),
    /// An error status or an empty page; stop.
    Stop,
}

/// Classify a page. `page_size` is the requested page size.
pub fn evaluate_page(page: NewsApiPage, page_size: usize) -> PageOutcome {
    if page.status != "ok" {
        warn!(
            status = %page.status,
            code = page.code.as_deref().unwrap_or(""),
            message = page.message.as_deref().unwrap_or(""),
            "NewsAPI returned an error"
        );
        return PageOutcome::Stop;
    }
    if page.articles.is_empty() {
        return PageOutcome::Stop;
    }
    if page.articles.len() < page_size {
        PageOutcome::Last(page.articles)
    } else {
        PageOutcome::Continue(page.articles)
    }
}

/// `from`/`to` dates (YYYY-MM-DD) covering the last `lookback_days` days.
pub fn date_range(now: DateTime<Utc>, lookback_days: i64) -> (String, String) {
    let from = now - chrono::Duration::days(lookback_days);
    (
        from.format("%Y-%m-%d").to_string(),
        now.format("%Y-%m-%d").to_string(),
    )
}

/// Fetches a deduplicated article corpus from NewsAPI.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    config: NewsConfig,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>, config: NewsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NewsRagError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Build a client reading the API key from `config.api_key_env`.
    pub fn from_config(config: &NewsConfig) -> Result<Self> {
        let key = api_key_from_env(&config.api_key_env)?;
        Self::new(key, config.clone())
    }

    /// All pages for one query term within `from..=to`.
    pub async fn fetch_query(&self, term: &str, from: &str, to: &str) -> Result<Vec<NewsArticle>> {
        info!(query = term, "Fetching NewsAPI query");
        let page_size = self.config.page_size as usize;
        let mut collected = Vec::new();

        for page in 1..=self.config.max_pages {
            let page_size_param = self.config.page_size.to_string();
            let page_param = page.to_string();
            let params = [
                ("apiKey", self.api_key.as_str()),
                ("q", term),
                ("from", from),
                ("to", to),
                ("sortBy", "publishedAt"),
                ("language", self.config.language.as_str()),
                ("pageSize", page_size_param.as_str()),
                ("page", page_param.as_str()),
            ];

            let response = self
                .client
                .get(&self.config.base_url)
                .query(&params)
                .send()
                .await
                .map_err(|e| NewsRagError::Corpus(format!("NewsAPI request failed: {}", e)))?;
            let body: NewsApiPage = response
                .json()
                .await
                .map_err(|e| NewsRagError::Corpus(format!("invalid NewsAPI response: {}", e)))?;

            match evaluate_page(body, page_size) {
                PageOutcome::Continue(articles) => {
                    debug!(query = term, page, count = articles.len(), "Fetched page");
                    collected.extend(articles);
                }
                PageOutcome::Last(articles) => {
                    collected.extend(articles);
                    break;
                }
                PageOutcome::Stop => break,
            }

            if page < self.config.max_pages && self.config.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }
        }

        info!(query = term, count = collected.len(), "Collected articles");
        Ok(collected)
    }

    /// Fetch every configured query term and deduplicate by URL.
    pub async fn fetch_corpus(&self) -> Result<Vec<NewsArticle>> {
        let (from, to) = date_range(Utc::now(), self.config.lookback_days);
        let mut all = Vec::new();
        for term in &self.config.query_terms {
            all.extend(self.fetch_query(term, &from, &to).await?);
        }
        let deduped = dedup_by_url(all);
        info!(count = deduped.len(), "Total deduplicated NewsAPI articles");
        Ok(deduped)
    }
}

#[async_trait]
impl CorpusSource for NewsApiClient {
    async fn documents(&self) -> Result<Vec<RawDocument>> {
        Ok(self
            .fetch_corpus()
            .await?
            .into_iter()
            .map(NewsArticle::into_raw_document)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page(status: &str, count: usize) -> NewsApiPage {
        NewsApiPage {
            status: status.to_string(),
            articles: (0..count)
                .map(|i| NewsArticle {
                    url: Some(format!("https://news.example/{}", i)),
                    ..NewsArticle::default()
                })
                .collect(),
            code: None,
            message: None,
        }
    }

    #[test]
    fn test_full_page_continues() {
        assert!(matches!(
            evaluate_page(page("ok", 100), 100),
            PageOutcome::Continue(a) if a.len() == 100
        ));
    }

    #[test]
    fn test_short_page_is_last() {
        assert!(matches!(
            evaluate_page(page("ok", 42), 100),
            PageOutcome::Last(a) if a.len() == 42
        ));
    }

    #[test]
    fn test_empty_or_error_stops() {
        assert_eq!(evaluate_page(page("ok", 0), 100), PageOutcome::Stop);
        assert_eq!(evaluate_page(page("error", 100), 100), PageOutcome::Stop);
    }

    #[test]
    fn test_error_page_deserializes() {
        let body: NewsApiPage = serde_json::from_str(
            r#"{"status":"error","code":"rateLimited","message":"Too many requests"}"#,
        )
        .unwrap();
        assert_eq!(body.code.as_deref(), Some("rateLimited"));
        assert!(body.articles.is_empty());
    }

    #[test]
    fn test_date_range_lookback() {
        let now = Utc.with_ymd_and_hms(2025, 12, 11, 8, 30, 0).unwrap();
        let (from, to) = date_range(now, 30);
        assert_eq!(from, "2025-11-11");
        assert_eq!(to, "2025-12-11");
    }
}
