use anyhow::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::SectorCatalog;
use crate::error::AnalyzerError;
use crate::formatter::{format_alert, format_message};
use crate::news::{fetch_or_empty, NewsSource};
use crate::notifier::{notify_or_warn, Notifier};
use crate::report::{Report, ReportAssembler};
use crate::scorer::{SectorScope, SectorScorer};

/// News source → scorer → assembler, one stateless run per call.
pub struct Analyzer {
    scorer: SectorScorer,
    assembler: ReportAssembler,
    news: Arc<dyn NewsSource>,
}

impl Analyzer {
    pub fn new(catalog: Arc<SectorCatalog>, news: Arc<dyn NewsSource>, history_depth: usize) -> Self {
        Analyzer {
            scorer: SectorScorer::new(catalog),
            assembler: ReportAssembler::new(history_depth),
            news,
        }
    }

    pub fn catalog(&self) -> &SectorCatalog {
        self.scorer.catalog()
    }

    pub async fn run(&self, scope: &SectorScope) -> Result<Report, AnalyzerError> {
        // Reject an unknown sector before touching the network.
        if let SectorScope::Single(name) = scope {
            if self.catalog().get(name).is_none() {
                return Err(AnalyzerError::UnknownSector(name.clone()));
            }
        }

        let news = fetch_or_empty(self.news.as_ref()).await;
        let results = self.scorer.score_scope(scope, &news)?;
        Ok(self.assembler.assemble(results, &news))
    }
}

/// When a finished report is pushed to the chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Off,
    /// Only when some sector reaches the alert threshold.
    Alert,
    /// Every run.
    Always,
}

/// Push `report` according to `mode`. `None` when there was nothing to send,
/// otherwise whether delivery succeeded. Failures are logged, never returned.
pub async fn deliver_report(
    report: &Report,
    mode: DeliveryMode,
    notifier: &dyn Notifier,
    destination: &str,
    alert_threshold: f64,
) -> Option<bool> {
    let message = match mode {
        DeliveryMode::Off => return None,
        DeliveryMode::Alert => format_alert(report, alert_threshold)?,
        DeliveryMode::Always => format_message(report),
    };
    Some(notify_or_warn(notifier, destination, &message).await)
}

/// Send `message` to every subscriber concurrently; returns how many went out.
pub async fn broadcast(notifier: &dyn Notifier, subscribers: &[i64], message: &str) -> usize {
    let sends = subscribers.iter().map(|id| {
        let destination = id.to_string();
        async move { notify_or_warn(notifier, &destination, message).await }
    });
    let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
    info!(
        "Broadcast delivered to {}/{} subscribers",
        delivered,
        subscribers.len()
    );
    delivered
}

/// Run `cycle` every `interval` until Ctrl+C. A cycle always finishes before
/// the next one starts; the sleep covers only what is left of the interval.
pub async fn run_watch<F, Fut>(interval: Duration, mut cycle: F) -> Result<()>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut cycle_number = 1u64;
    loop {
        let cycle_start = tokio::time::Instant::now();
        info!("═══ Watch cycle {} starting ═══", cycle_number);
        cycle(cycle_number).await;

        let sleep_duration = interval.saturating_sub(cycle_start.elapsed());
        if sleep_duration.is_zero() {
            warn!(
                "Cycle {} took longer than the {:?} interval",
                cycle_number, interval
            );
        } else {
            info!(
                "Sleeping {:.0}s until next cycle",
                sleep_duration.as_secs_f64()
            );
        }
        cycle_number += 1;

        tokio::select! {
            _ = tokio::time::sleep(sleep_duration) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, stopping watch loop");
                return Ok(());
            }
        }
    }
}
