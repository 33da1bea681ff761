//! News ingestion.
//!
//! The pipeline only needs an ordered list of [`NewsItem`]s; where they come from
//! is behind the [`NewsSource`] trait. Two sources ship with the crate:
//!
//! - [`StaticNewsSource`]: a fixed in-memory feed (the default)
//! - [`NewsApiSource`]: `GET {base}/v2/everything` on a NewsAPI-compatible endpoint

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::TARIFF_KEYWORDS;
use crate::error::AnalyzerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        NewsItem {
            title: title.into(),
            description: description.into(),
            source: String::new(),
            published_at: Utc::now(),
            country: String::new(),
            keywords: Vec::new(),
        }
    }

    /// Lower-cased `title + " " + description`, the text keyword matching runs on.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }

    /// Record which of `keywords` the item mentions.
    pub fn with_matched_keywords(mut self, keywords: &[&str]) -> Self {
        let text = self.search_text();
        self.keywords = keywords
            .iter()
            .filter(|k| text.contains(*k))
            .map(|k| k.to_string())
            .collect();
        self
    }
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<NewsItem>, AnalyzerError>;
}

/// Fetch from `source`, falling back to an empty list when it is unavailable.
pub async fn fetch_or_empty(source: &dyn NewsSource) -> Vec<NewsItem> {
    match source.fetch().await {
        Ok(items) => {
            info!("Fetched {} news items from {}", items.len(), source.name());
            items
        }
        Err(e) => {
            warn!("{} failed, continuing with no news: {}", source.name(), e);
            Vec::new()
        }
    }
}

// ─── Static feed ───────────────────────────────────────

pub struct StaticNewsSource {
    items: Vec<NewsItem>,
}

impl StaticNewsSource {
    pub fn new(items: Vec<NewsItem>) -> Self {
        StaticNewsSource { items }
    }

    /// Built-in sample headlines.
    pub fn sample() -> Self {
        let at = |y, m, d| {
            Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
                .single()
                .unwrap_or_else(Utc::now)
        };
        let item = |title: &str,
                    description: &str,
                    source: &str,
                    country: &str,
                    published: DateTime<Utc>| {
            NewsItem {
                title: title.to_string(),
                description: description.to_string(),
                source: source.to_string(),
                published_at: published,
                country: country.to_string(),
                keywords: Vec::new(),
            }
            .with_matched_keywords(TARIFF_KEYWORDS)
        };

        StaticNewsSource::new(vec![
            item(
                "Trump announces new tariffs on steel",
                "25% tariff on steel imports hits manufacturing supply chains",
                "Reuters",
                "US",
                at(2026, 10, 14),
            ),
            item(
                "China responds to tariffs",
                "Retaliatory tariffs on US agriculture including soybeans and pork",
                "Bloomberg",
                "CN",
                at(2026, 10, 15),
            ),
            item(
                "Chipmakers brace for trade war escalation",
                "Semiconductor export curbs and new tariffs weigh on tech stocks",
                "Financial Times",
                "US",
                at(2026, 10, 16),
            ),
            item(
                "EU weighs tariffs on imported vehicles",
                "Automaker shares slip as Brussels considers customs duty increase",
                "Politico Europe",
                "EU",
                at(2026, 10, 17),
            ),
            item(
                "Retailers warn of price hikes",
                "Import tax on consumer goods could raise shelf prices this season",
                "Wall Street Journal",
                "US",
                at(2026, 10, 18),
            ),
        ])
    }
}

#[async_trait]
impl NewsSource for StaticNewsSource {
    fn name(&self) -> &str {
        "static feed"
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, AnalyzerError> {
        Ok(self.items.clone())
    }
}

// ─── NewsAPI ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<NewsApiArticleSource>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticleSource {
    #[serde(default)]
    name: Option<String>,
}

pub struct NewsApiSource {
    client: Client,
    base_url: String,
    api_key: String,
    query: String,
    country: String,
    page_size: u32,
}

impl NewsApiSource {
    pub fn new(
        base_url: &str,
        api_key: &str,
        query: &str,
        country: &str,
        page_size: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("tariff-impact/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build news HTTP client")?;

        Ok(NewsApiSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            query: query.to_string(),
            country: country.to_string(),
            page_size,
        })
    }

    fn to_item(&self, article: NewsApiArticle) -> Option<NewsItem> {
        let title = article.title.filter(|t| !t.trim().is_empty())?;
        let published_at = article
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(
            NewsItem {
                title,
                description: article.description.unwrap_or_default(),
                source: article
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "unknown".to_string()),
                published_at,
                country: self.country.clone(),
                keywords: Vec::new(),
            }
            .with_matched_keywords(TARIFF_KEYWORDS),
        )
    }
}

#[async_trait]
impl NewsSource for NewsApiSource {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, AnalyzerError> {
        let url = format!("{}/v2/everything", self.base_url);
        let page_size = self.page_size.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.query.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalyzerError::UpstreamUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::UpstreamUnavailable(format!(
                "NewsAPI returned {}: {}",
                status, body
            )));
        }

        let parsed: NewsApiResponse = response.json().await.map_err(|e| {
            AnalyzerError::UpstreamUnavailable(format!("Failed to parse NewsAPI response: {}", e))
        })?;

        if parsed.status != "ok" {
            return Err(AnalyzerError::UpstreamUnavailable(format!(
                "NewsAPI status '{}': {}",
                parsed.status,
                parsed.message.unwrap_or_default()
            )));
        }

        let items: Vec<NewsItem> = parsed
            .articles
            .into_iter()
            .filter_map(|a| self.to_item(a))
            .collect();
        debug!("NewsAPI returned {} usable articles", items.len());
        Ok(items)
    }
}
