use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::news::{NewsApiSource, NewsSource, StaticNewsSource};

#[derive(Debug, Clone, PartialEq)]
pub enum NewsSourceKind {
    Static,
    NewsApi,
}

impl FromStr for NewsSourceKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "static" => Ok(NewsSourceKind::Static),
            "newsapi" => Ok(NewsSourceKind::NewsApi),
            _ => anyhow::bail!(
                "Invalid news source: '{}'. Must be 'static' or 'newsapi'",
                s
            ),
        }
    }
}

impl std::fmt::Display for NewsSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NewsSourceKind::Static => write!(f, "static"),
            NewsSourceKind::NewsApi => write!(f, "newsapi"),
        }
    }
}

/// Log line encoding on stderr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format: '{}'. Must be 'text' or 'json'", s),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // News
    pub news_source: NewsSourceKind,
    pub news_api_url: String,
    pub news_api_key: String,
    pub news_query: String,
    pub news_country: String,
    pub news_page_size: u32,
    pub news_request_timeout_secs: u64,
    // Telegram
    pub telegram_api_url: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub notify_timeout_secs: u64,
    pub bot_poll_timeout_secs: u64,
    // Analysis
    pub catalog_path: Option<String>,
    pub report_dir: String,
    pub history_depth: usize,
    pub watch_interval_secs: u64,
    pub alert_threshold: f64,
    // Dashboard
    pub dashboard_port: u16,
    pub dashboard_password: Option<String>,
    // Logging
    pub log_format: LogFormat,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Don't fail if .env missing

        let config = Config {
            news_source: env::var("NEWS_SOURCE")
                .unwrap_or_else(|_| "static".to_string())
                .parse()
                .context("Failed to parse NEWS_SOURCE")?,
            news_api_url: env::var("NEWS_API_URL")
                .unwrap_or_else(|_| "https://newsapi.org".to_string()),
            news_api_key: env::var("NEWS_API_KEY").unwrap_or_default(),
            news_query: env::var("NEWS_QUERY")
                .unwrap_or_else(|_| "tariff OR \"trade war\" OR \"import tax\"".to_string()),
            news_country: env::var("NEWS_COUNTRY").unwrap_or_else(|_| "US".to_string()),
            news_page_size: env::var("NEWS_PAGE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("Failed to parse NEWS_PAGE_SIZE")?,
            news_request_timeout_secs: env::var("NEWS_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .context("Failed to parse NEWS_REQUEST_TIMEOUT_SECS")?,
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
            notify_timeout_secs: env::var("NOTIFY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Failed to parse NOTIFY_TIMEOUT_SECS")?,
            bot_poll_timeout_secs: env::var("BOT_POLL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Failed to parse BOT_POLL_TIMEOUT_SECS")?,
            catalog_path: optional("CATALOG_PATH"),
            report_dir: env::var("REPORT_DIR").unwrap_or_else(|_| ".".to_string()),
            history_depth: env::var("HISTORY_DEPTH")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Failed to parse HISTORY_DEPTH")?,
            watch_interval_secs: env::var("WATCH_INTERVAL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("Failed to parse WATCH_INTERVAL_SECS")?,
            alert_threshold: env::var("ALERT_THRESHOLD")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()
                .context("Failed to parse ALERT_THRESHOLD")?,
            dashboard_port: env::var("DASHBOARD_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Failed to parse DASHBOARD_PORT")?,
            dashboard_password: optional("DASHBOARD_PASSWORD"),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string())
                .parse()
                .context("Failed to parse LOG_FORMAT")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.watch_interval_secs == 0 {
            anyhow::bail!("WATCH_INTERVAL_SECS must be greater than zero");
        }
        if !(0.0..=10.0).contains(&self.alert_threshold) {
            anyhow::bail!(
                "ALERT_THRESHOLD must be between 0 and 10, got {}",
                self.alert_threshold
            );
        }
        if self.news_source == NewsSourceKind::NewsApi && self.news_api_key.is_empty() {
            anyhow::bail!("NEWS_SOURCE=newsapi requires NEWS_API_KEY");
        }
        Ok(())
    }

    pub fn build_news_source(&self) -> Result<Arc<dyn NewsSource>> {
        Ok(match self.news_source {
            NewsSourceKind::Static => Arc::new(StaticNewsSource::sample()),
            NewsSourceKind::NewsApi => Arc::new(NewsApiSource::new(
                &self.news_api_url,
                &self.news_api_key,
                &self.news_query,
                &self.news_country,
                self.news_page_size,
                self.news_request_timeout_secs,
            )?),
        })
    }

    pub fn telegram_configured(&self) -> bool {
        !self.telegram_bot_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        // from_env should succeed with defaults
        let config = Config::from_env().unwrap();
        assert_eq!(config.news_source, NewsSourceKind::Static);
        assert_eq!(config.news_api_url, "https://newsapi.org");
        assert_eq!(config.telegram_api_url, "https://api.telegram.org");
        assert_eq!(config.news_page_size, 50);
        assert_eq!(config.history_depth, 3);
        assert_eq!(config.watch_interval_secs, 1800);
        assert_eq!(config.alert_threshold, 5.0);
        assert_eq!(config.dashboard_port, 3000);
        assert_eq!(config.notify_timeout_secs, 10);
        assert_eq!(config.bot_poll_timeout_secs, 30);
        assert_eq!(config.report_dir, ".");
        assert!(config.catalog_path.is_none());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_news_source_kind_parsing() {
        assert_eq!(
            "static".parse::<NewsSourceKind>().unwrap(),
            NewsSourceKind::Static
        );
        assert_eq!(
            "NewsAPI".parse::<NewsSourceKind>().unwrap(),
            NewsSourceKind::NewsApi
        );
        assert!("rss".parse::<NewsSourceKind>().is_err());
    }

    #[test]
    fn test_news_source_kind_display() {
        assert_eq!(NewsSourceKind::Static.to_string(), "static");
        assert_eq!(NewsSourceKind::NewsApi.to_string(), "newsapi");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::from_env().unwrap();
        config.alert_threshold = 11.0;
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.watch_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.news_source = NewsSourceKind::NewsApi;
        config.news_api_key.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_static_source_by_default() {
        let config = Config::from_env().unwrap();
        let source = config.build_news_source().unwrap();
        assert_eq!(source.name(), "static feed");
        assert!(!source.fetch().await.unwrap().is_empty());
    }
}
