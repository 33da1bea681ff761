use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::HISTORICAL_EVENTS;
use crate::formatter::{
    escape_markdown, format_alert, format_history, format_message, format_sectors,
};
use crate::notifier::{notify_or_warn, Notifier, TelegramResponse};
use crate::pipeline::{broadcast, Analyzer};
use crate::scorer::SectorScope;

// ─── Subscriber store ──────────────────────────────────

/// User id → alert subscription state.
pub trait SubscriberStore: Send + Sync {
    fn is_subscribed(&self, user_id: i64) -> bool;

    fn set_subscribed(&self, user_id: i64, subscribed: bool);

    /// Flip the user's state and return the new one.
    fn toggle(&self, user_id: i64) -> bool {
        let next = !self.is_subscribed(user_id);
        self.set_subscribed(user_id, next);
        next
    }

    /// Subscribed user ids, ascending.
    fn subscribers(&self) -> Vec<i64>;
}

#[derive(Default)]
pub struct InMemorySubscriberStore {
    inner: Mutex<HashMap<i64, bool>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<i64, bool>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SubscriberStore for InMemorySubscriberStore {
    fn is_subscribed(&self, user_id: i64) -> bool {
        self.map().get(&user_id).copied().unwrap_or(false)
    }

    fn set_subscribed(&self, user_id: i64, subscribed: bool) {
        self.map().insert(user_id, subscribed);
    }

    fn toggle(&self, user_id: i64) -> bool {
        let mut map = self.map();
        let entry = map.entry(user_id).or_insert(false);
        *entry = !*entry;
        *entry
    }

    fn subscribers(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .map()
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

// ─── Commands ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Analyze(Option<String>),
    Sectors,
    History,
    Alerts,
    Watch,
    Stats,
    Settings,
    Unknown(String),
}

fn command_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/([A-Za-z_]+)(?:@[A-Za-z0-9_]+)?(?:\s+(.+))?$").ok())
        .as_ref()
}

impl BotCommand {
    /// Parse `/command[@bot] [argument]`. Plain text is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = command_regex()?.captures(text.trim())?;
        let name = caps.get(1)?.as_str().to_lowercase();
        let arg = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());

        Some(match name.as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "analyze" => BotCommand::Analyze(arg),
            "sectors" => BotCommand::Sectors,
            "history" => BotCommand::History,
            "alerts" => BotCommand::Alerts,
            "watch" => BotCommand::Watch,
            "stats" => BotCommand::Stats,
            "settings" => BotCommand::Settings,
            _ => BotCommand::Unknown(name),
        })
    }
}

const HELP_TEXT: &str = "📊 *Tariff Impact Analyzer Commands*

/analyze [sector] - Get latest sector analysis
/sectors - List all tracked sectors
/history - Historical tariff events
/alerts - Current high-impact alerts
/watch - Toggle auto-alerts
/stats - Bot statistics
/settings - Current settings
/help - Show this message";

const WELCOME_TEXT: &str = "👋 *Welcome to Tariff Impact Analyzer!*

I help you track tariff impacts on markets.

";

// ─── Handler ───────────────────────────────────────────

pub struct BotHandler {
    analyzer: Arc<Analyzer>,
    subscribers: Arc<dyn SubscriberStore>,
    alert_threshold: f64,
    started_at: Instant,
}

impl BotHandler {
    pub fn new(
        analyzer: Arc<Analyzer>,
        subscribers: Arc<dyn SubscriberStore>,
        alert_threshold: f64,
    ) -> Self {
        BotHandler {
            analyzer,
            subscribers,
            alert_threshold,
            started_at: Instant::now(),
        }
    }

    pub fn subscribers(&self) -> &Arc<dyn SubscriberStore> {
        &self.subscribers
    }

    /// One watch cycle: analyze everything and push the alert to every
    /// subscriber if some sector reached the threshold. Returns deliveries.
    pub async fn alert_subscribers(&self, notifier: &dyn Notifier) -> usize {
        let report = match self.analyzer.run(&SectorScope::All).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Alert cycle failed: {}", e);
                return 0;
            }
        };
        let Some(alert) = format_alert(&report, self.alert_threshold) else {
            debug!("No sector at or above {:.1}", self.alert_threshold);
            return 0;
        };
        let subscribers = self.subscribers.subscribers();
        if subscribers.is_empty() {
            return 0;
        }
        broadcast(notifier, &subscribers, &alert).await
    }

    /// Reply text for an incoming message, or `None` if it is not a command.
    pub async fn handle_text(&self, text: &str, user_id: i64) -> Option<String> {
        let command = BotCommand::parse(text)?;
        debug!("User {} sent {:?}", user_id, command);
        Some(self.handle(command, user_id).await)
    }

    pub async fn handle(&self, command: BotCommand, user_id: i64) -> String {
        match command {
            BotCommand::Start => format!("{}{}", WELCOME_TEXT, HELP_TEXT),
            BotCommand::Help => HELP_TEXT.to_string(),
            BotCommand::Analyze(sector) => {
                let scope = sector.map_or(SectorScope::All, SectorScope::Single);
                match self.analyzer.run(&scope).await {
                    Ok(report) => format_message(&report),
                    Err(e) => format!("❌ Error: {}", escape_markdown(&e.to_string())),
                }
            }
            BotCommand::Sectors => format_sectors(self.analyzer.catalog()),
            BotCommand::History => format_history(HISTORICAL_EVENTS),
            BotCommand::Alerts => match self.analyzer.run(&SectorScope::All).await {
                Ok(report) => format_alert(&report, self.alert_threshold).unwrap_or_else(|| {
                    "🚨 *Current Alerts*\n\nNo high-impact alerts at this time.\n\n🔔 To enable auto-alerts: /watch".to_string()
                }),
                Err(e) => format!("❌ Error: {}", escape_markdown(&e.to_string())),
            },
            BotCommand::Watch => {
                if self.subscribers.toggle(user_id) {
                    info!("User {} subscribed to alerts", user_id);
                    "🔔 Auto-alerts enabled! You will receive alerts when significant tariff impacts are detected.".to_string()
                } else {
                    info!("User {} unsubscribed from alerts", user_id);
                    "🔕 Auto-alerts disabled".to_string()
                }
            }
            BotCommand::Stats => format!(
                "📈 *Bot Statistics*\n\n• Subscribers: {}\n• Sectors tracked: {}\n• Uptime: {}s\n• Version: {}",
                self.subscribers.subscribers().len(),
                self.analyzer.catalog().len(),
                self.started_at.elapsed().as_secs(),
                env!("CARGO_PKG_VERSION"),
            ),
            BotCommand::Settings => format!(
                "⚙️ *Settings*\n\n• Alert threshold: {:.1}/10\n• Auto-alerts: {}\n\nUse /watch to toggle alerts.",
                self.alert_threshold,
                if self.subscribers.is_subscribed(user_id) {
                    "on"
                } else {
                    "off"
                },
            ),
            BotCommand::Unknown(name) => {
                format!("🤔 Unknown command /{}. Try /help", escape_markdown(&name))
            }
        }
    }
}

// ─── Telegram long polling ─────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

pub struct TelegramBot {
    client: Client,
    api_url: String,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self> {
        if token.is_empty() {
            anyhow::bail!("TELEGRAM_BOT_TOKEN not set (get one from @BotFather)");
        }
        // The HTTP timeout must outlast the server-side long poll.
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .context("Failed to build Telegram bot HTTP client")?;

        Ok(TelegramBot {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout_secs,
        })
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{}/bot{}/getUpdates", self.api_url, self.token);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to poll Telegram updates")?;

        let status = response.status();
        let parsed: TelegramResponse<Vec<Update>> = response
            .json()
            .await
            .context("Failed to parse getUpdates response")?;
        if !status.is_success() || !parsed.ok {
            anyhow::bail!(
                "getUpdates returned {}: {}",
                status,
                parsed.description.unwrap_or_default()
            );
        }
        Ok(parsed.result.unwrap_or_default())
    }

    /// Poll for commands and answer them until Ctrl+C.
    pub async fn run(&self, handler: &BotHandler, notifier: &dyn Notifier) -> Result<()> {
        info!("Bot polling for updates");
        let mut offset = 0i64;

        loop {
            let polled = tokio::select! {
                r = self.get_updates(offset) => r,
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, stopping bot");
                    return Ok(());
                }
            };

            let updates = match polled {
                Ok(u) => u,
                Err(e) => {
                    warn!("Telegram poll failed: {:#}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                let Some(text) = message.text.as_deref() else {
                    continue;
                };
                let user_id = message.from.as_ref().map_or(message.chat.id, |u| u.id);
                if let Some(reply) = handler.handle_text(text, user_id).await {
                    notify_or_warn(notifier, &message.chat.id.to_string(), &reply).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::NewsItem;
    use crate::pipeline::tests::{analyzer_with, RecordingNotifier};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handler(news: Vec<NewsItem>) -> BotHandler {
        BotHandler::new(
            Arc::new(analyzer_with(news)),
            Arc::new(InMemorySubscriberStore::new()),
            5.0,
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse(" /HELP "), Some(BotCommand::Help));
        assert_eq!(
            BotCommand::parse("/analyze@TariffBot Agriculture"),
            Some(BotCommand::Analyze(Some("Agriculture".into())))
        );
        assert_eq!(BotCommand::parse("/analyze"), Some(BotCommand::Analyze(None)));
        assert_eq!(
            BotCommand::parse("/foo"),
            Some(BotCommand::Unknown("foo".into()))
        );
        assert_eq!(BotCommand::parse("hello there"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn test_store_toggle() {
        let store = InMemorySubscriberStore::new();
        assert!(!store.is_subscribed(7));
        assert!(store.toggle(7));
        assert!(store.toggle(9));
        assert_eq!(store.subscribers(), vec![7, 9]);
        assert!(!store.toggle(7));
        assert_eq!(store.subscribers(), vec![9]);
        store.set_subscribed(1, true);
        assert_eq!(store.subscribers(), vec![1, 9]);
    }

    #[tokio::test]
    async fn test_watch_toggles_subscription() {
        let h = handler(vec![]);
        let on = h.handle(BotCommand::Watch, 42).await;
        assert!(on.contains("enabled"));
        assert!(h.subscribers().is_subscribed(42));
        let off = h.handle(BotCommand::Watch, 42).await;
        assert!(off.contains("disabled"));
        assert!(h.subscribers().subscribers().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_replies_with_report() {
        let h = handler(vec![NewsItem::new(
            "China tariffs on US agriculture",
            "25% tariff on soybean imports",
        )]);
        let reply = h.handle_text("/analyze", 1).await.unwrap();
        assert!(reply.contains("Tariff Impact Report"));
        assert!(reply.contains("*Caution:* Agriculture"));
        assert!(reply.contains("_Based on 1 news items_"));
    }

    #[tokio::test]
    async fn test_analyze_unknown_sector() {
        let h = handler(vec![]);
        let reply = h.handle_text("/analyze Crypto", 1).await.unwrap();
        assert!(reply.starts_with("❌ Error: Unknown sector"));
    }

    #[tokio::test]
    async fn test_replies_escape_user_text() {
        let h = handler(vec![]);
        let reply = h.handle_text("/analyze crypto_coins", 1).await.unwrap();
        assert!(reply.contains("crypto\\_coins"), "{}", reply);
        assert!(!reply.contains("crypto_coins"));

        let reply = h.handle_text("/alert_threshold 3", 1).await.unwrap();
        assert_eq!(reply, "🤔 Unknown command /alert\\_threshold. Try /help");
    }

    #[tokio::test]
    async fn test_alerts_when_quiet() {
        let h = handler(vec![]);
        let reply = h.handle(BotCommand::Alerts, 1).await;
        assert!(reply.contains("No high-impact alerts"));
    }

    #[tokio::test]
    async fn test_static_replies() {
        let h = handler(vec![]);
        assert!(h.handle(BotCommand::Sectors, 1).await.contains("Technology"));
        assert!(h.handle(BotCommand::History, 1).await.contains("2018-03-01"));
        assert!(h.handle(BotCommand::Start, 1).await.contains("/watch"));
        assert!(h.handle(BotCommand::Settings, 1).await.contains("Auto-alerts: off"));
        assert!(h.handle(BotCommand::Stats, 1).await.contains("Subscribers: 0"));
        assert!(h.handle_text("just chatting", 1).await.is_none());
    }

    #[tokio::test]
    async fn test_alert_cycle_reaches_subscribers_only() {
        let steel = (0..3)
            .map(|i| NewsItem::new(format!("Steel tariff {}", i), "mills cut output"))
            .collect();
        let h = handler(steel);
        let notifier = RecordingNotifier::default();

        assert_eq!(h.alert_subscribers(&notifier).await, 0);

        h.subscribers().set_subscribed(11, true);
        h.subscribers().set_subscribed(12, false);
        assert_eq!(h.alert_subscribers(&notifier).await, 1);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "11");
        assert!(sent[0].1.starts_with("🚨 *Tariff Alert*"));
    }

    #[tokio::test]
    async fn test_alert_cycle_quiet_news() {
        let h = handler(vec![]);
        h.subscribers().set_subscribed(11, true);
        let notifier = RecordingNotifier::default();
        assert_eq!(h.alert_subscribers(&notifier).await, 0);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_updates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getUpdates"))
            .and(query_param("offset", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 5,
                        "message": {
                            "message_id": 10,
                            "chat": {"id": 100, "type": "private"},
                            "from": {"id": 200, "is_bot": false, "first_name": "A"},
                            "text": "/watch"
                        }
                    },
                    {"update_id": 6}
                ]
            })))
            .mount(&server)
            .await;

        let bot = TelegramBot::new(&server.uri(), "TOKEN", 0).unwrap();
        let updates = bot.get_updates(5).await.unwrap();
        assert_eq!(updates.len(), 2);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.chat.id, 100);
        assert_eq!(msg.from.as_ref().unwrap().id, 200);
        assert_eq!(msg.text.as_deref(), Some("/watch"));
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn test_get_updates_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Conflict: terminated by other getUpdates request"
            })))
            .mount(&server)
            .await;

        let bot = TelegramBot::new(&server.uri(), "TOKEN", 0).unwrap();
        let err = bot.get_updates(0).await.unwrap_err();
        assert!(err.to_string().contains("Conflict"));
    }

    #[test]
    fn test_bot_requires_token() {
        assert!(TelegramBot::new("http://unused", "", 30).is_err());
    }
}
