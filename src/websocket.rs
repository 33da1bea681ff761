use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::report::Report;
use crate::thresholds::RiskTier;

/// Events pushed to connected dashboard clients via WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    AnalysisComplete {
        timestamp: DateTime<Utc>,
        overall_risk: RiskTier,
        avoid_count: usize,
        caution_count: usize,
        safe_count: usize,
        top_sector: Option<String>,
    },
}

impl DashboardEvent {
    pub fn analysis_complete(report: &Report) -> Self {
        let summary = &report.summary;
        DashboardEvent::AnalysisComplete {
            timestamp: report.timestamp,
            overall_risk: summary.overall_risk,
            avoid_count: summary.avoid_count,
            caution_count: summary.caution_count,
            safe_count: summary.safe_count,
            top_sector: summary.top_sector.clone(),
        }
    }
}

pub type EventSender = broadcast::Sender<DashboardEvent>;

/// Create a new broadcast channel for dashboard events.
pub fn new_event_channel() -> EventSender {
    let (tx, _) = broadcast::channel(64);
    tx
}

/// Axum handler: upgrade HTTP to WebSocket, then forward events.
pub async fn ws_handler(ws: WebSocketUpgrade, State(tx): State<EventSender>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, tx))
}

async fn handle_ws(mut socket: WebSocket, tx: EventSender) {
    let mut rx = tx.subscribe();
    debug!("Dashboard WebSocket client connected");

    loop {
        tokio::select! {
            // Forward broadcast events to client
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let json = match serde_json::to_string(&ev) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize dashboard event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break; // Client disconnected
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dashboard WS client lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break; // Channel closed
                    }
                }
            }
            // Handle incoming messages (read-only dashboard, just consume/ignore)
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {} // Ignore text/binary from client
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("Dashboard WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SectorCatalog;
    use crate::news::NewsItem;
    use crate::report::ReportAssembler;
    use crate::scorer::SectorScorer;
    use std::sync::Arc;

    fn quiet_event() -> DashboardEvent {
        let scorer = SectorScorer::new(Arc::new(SectorCatalog::builtin().unwrap()));
        let report = ReportAssembler::default().assemble(scorer.score_all(&[]), &[]);
        DashboardEvent::analysis_complete(&report)
    }

    #[test]
    fn test_event_serialization_analysis_complete() {
        let json = serde_json::to_value(quiet_event()).unwrap();
        assert_eq!(json["type"], "analysis_complete");
        assert_eq!(json["overall_risk"], "LOW");
        assert_eq!(json["safe_count"], 7);
        assert_eq!(json["avoid_count"], 0);
    }

    #[test]
    fn test_event_from_report_counts() {
        let scorer = SectorScorer::new(Arc::new(SectorCatalog::builtin().unwrap()));
        let news: Vec<NewsItem> = (0..4)
            .map(|i| NewsItem::new(format!("Chip tariff {}", i), "semiconductor duties"))
            .collect();
        let report = ReportAssembler::default().assemble(scorer.score_all(&news), &news);

        let DashboardEvent::AnalysisComplete {
            overall_risk,
            avoid_count,
            top_sector,
            ..
        } = DashboardEvent::analysis_complete(&report);
        assert_eq!(overall_risk, RiskTier::High);
        assert_eq!(avoid_count, 1);
        assert_eq!(top_sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn test_broadcast_channel_send_receive() {
        let tx = new_event_channel();
        let mut rx = tx.subscribe();

        tx.send(quiet_event()).unwrap();
        let received = rx.try_recv().unwrap();
        assert!(matches!(
            received,
            DashboardEvent::AnalysisComplete { safe_count: 7, .. }
        ));
    }

    #[test]
    fn test_broadcast_no_receivers_ok() {
        let tx = new_event_channel();
        // No subscribers: send returns Err but does not panic
        assert!(tx.send(quiet_event()).is_err());
    }
}
