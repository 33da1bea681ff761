use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use tariff_impact::bot::{BotHandler, InMemorySubscriberStore, TelegramBot};
use tariff_impact::catalog::{SectorCatalog, HISTORICAL_EVENTS};
use tariff_impact::config::{Config, LogFormat};
use tariff_impact::dashboard::start_dashboard;
use tariff_impact::error::AnalyzerError;
use tariff_impact::formatter::{format_console, format_history};
use tariff_impact::notifier::TelegramNotifier;
use tariff_impact::pipeline::{deliver_report, run_watch, Analyzer, DeliveryMode};
use tariff_impact::report::write_report;
use tariff_impact::scorer::SectorScope;
use tariff_impact::websocket::{new_event_channel, DashboardEvent};

#[derive(Parser)]
#[command(
    name = "tariff-impact",
    version,
    about = "Score market sectors for tariff exposure from news",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report (default)
    Report(ReportArgs),
    /// Run the Telegram bot
    Bot,
    /// Serve the web dashboard
    Dashboard,
}

#[derive(Args)]
struct ReportArgs {
    /// Analyze a single sector
    #[arg(long)]
    sector: Option<String>,
    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
    /// Also print the historical tariff events
    #[arg(long)]
    history: bool,
    /// Re-run every WATCH_INTERVAL_SECS until Ctrl+C
    #[arg(long)]
    watch: bool,
    /// Send to Telegram only when a sector reaches ALERT_THRESHOLD
    #[arg(long)]
    alert: bool,
    /// Send every report to Telegram
    #[arg(long)]
    telegram: bool,
}

impl ReportArgs {
    fn scope(&self) -> SectorScope {
        self.sector
            .clone()
            .map_or(SectorScope::All, SectorScope::Single)
    }

    fn delivery_mode(&self) -> DeliveryMode {
        if self.alert {
            DeliveryMode::Alert
        } else if self.telegram {
            DeliveryMode::Always
        } else {
            DeliveryMode::Off
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Logs go to stderr so --json output stays machine-readable
    let logs = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tariff_impact=info")),
        )
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => logs.json().init(),
        LogFormat::Text => logs.init(),
    }

    let catalog = Arc::new(SectorCatalog::load(config.catalog_path.as_deref())?);
    let news = config.build_news_source()?;
    info!(
        "Tariff Impact Analyzer starting: {} sectors, {} news source",
        catalog.len(),
        news.name()
    );
    let analyzer = Arc::new(Analyzer::new(catalog, news, config.history_depth));

    match cli.command.unwrap_or(Commands::Report(cli.report)) {
        Commands::Report(args) => run_report(&config, &analyzer, &args).await,
        Commands::Bot => run_bot(&config, analyzer).await,
        Commands::Dashboard => run_dashboard(&config, analyzer).await,
    }
}

// ─── Report mode ───────────────────────────────────────

async fn run_report(config: &Config, analyzer: &Analyzer, args: &ReportArgs) -> Result<()> {
    if let Some(name) = &args.sector {
        if analyzer.catalog().get(name).is_none() {
            return Err(AnalyzerError::UnknownSector(name.clone()).into());
        }
    }

    let mode = args.delivery_mode();
    let notifier = match mode {
        DeliveryMode::Off => None,
        _ => {
            if !config.telegram_configured() || config.telegram_chat_id.is_empty() {
                warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, reports will not be delivered");
            }
            Some(TelegramNotifier::new(
                &config.telegram_api_url,
                &config.telegram_bot_token,
                config.notify_timeout_secs,
            )?)
        }
    };

    if !args.watch {
        return report_once(config, analyzer, args, notifier.as_ref()).await;
    }

    let interval = Duration::from_secs(config.watch_interval_secs);
    info!("Watch mode: re-running every {}s", config.watch_interval_secs);
    let notifier = notifier.as_ref();
    run_watch(interval, move |_| async move {
        if let Err(e) = report_once(config, analyzer, args, notifier).await {
            error!("Report run failed: {:#}", e);
        }
    })
    .await
}

async fn report_once(
    config: &Config,
    analyzer: &Analyzer,
    args: &ReportArgs,
    notifier: Option<&TelegramNotifier>,
) -> Result<()> {
    let report = analyzer.run(&args.scope()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_console(&report));
        if args.history {
            println!("\n{}", format_history(HISTORICAL_EVENTS));
        }
    }

    write_report(&config.report_dir, &report)?;

    if let Some(notifier) = notifier {
        match deliver_report(
            &report,
            args.delivery_mode(),
            notifier,
            &config.telegram_chat_id,
            config.alert_threshold,
        )
        .await
        {
            Some(true) => info!("Report delivered to Telegram"),
            Some(false) => warn!("Report not delivered to Telegram"),
            None => info!("No sector at or above {:.1}, nothing sent", config.alert_threshold),
        }
    }

    Ok(())
}

// ─── Bot mode ──────────────────────────────────────────

async fn run_bot(config: &Config, analyzer: Arc<Analyzer>) -> Result<()> {
    let bot = TelegramBot::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.bot_poll_timeout_secs,
    )?;
    let notifier = Arc::new(TelegramNotifier::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.notify_timeout_secs,
    )?);
    let handler = Arc::new(BotHandler::new(
        analyzer,
        Arc::new(InMemorySubscriberStore::new()),
        config.alert_threshold,
    ));

    // Background alert loop for /watch subscribers
    let interval = Duration::from_secs(config.watch_interval_secs);
    let alerts = {
        let handler = handler.clone();
        let notifier = notifier.clone();
        tokio::spawn(async move {
            run_watch(interval, move |_| {
                let handler = handler.clone();
                let notifier = notifier.clone();
                async move {
                    let delivered = handler.alert_subscribers(notifier.as_ref()).await;
                    if delivered > 0 {
                        info!("Alert pushed to {} subscribers", delivered);
                    }
                }
            })
            .await
        })
    };

    info!("🤖 Tariff bot running");
    let result = bot.run(&handler, notifier.as_ref()).await;
    alerts.abort();
    result
}

// ─── Dashboard mode ────────────────────────────────────

async fn run_dashboard(config: &Config, analyzer: Arc<Analyzer>) -> Result<()> {
    let event_tx = new_event_channel();

    // Periodic analysis so connected clients see fresh results
    let interval = Duration::from_secs(config.watch_interval_secs);
    let publisher = {
        let analyzer = analyzer.clone();
        let tx = event_tx.clone();
        tokio::spawn(async move {
            run_watch(interval, move |_| {
                let analyzer = analyzer.clone();
                let tx = tx.clone();
                async move {
                    match analyzer.run(&SectorScope::All).await {
                        Ok(report) => {
                            let _ = tx.send(DashboardEvent::analysis_complete(&report));
                        }
                        Err(e) => warn!("Scheduled analysis failed: {}", e),
                    }
                }
            })
            .await
        })
    };

    let result = tokio::select! {
        r = start_dashboard(config, analyzer, event_tx) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, stopping dashboard");
            Ok(())
        }
    };
    publisher.abort();
    result
}
