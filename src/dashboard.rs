use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::{debug, info};

use crate::catalog::{HistoricalEvent, Sector, Vulnerability, HISTORICAL_EVENTS};
use crate::config::Config;
use crate::error::{AnalyzerError, ErrorKind};
use crate::pipeline::Analyzer;
use crate::report::Report;
use crate::scorer::SectorScope;
use crate::thresholds::{Action, RiskTier, Sentiment};
use crate::websocket::{ws_handler, DashboardEvent, EventSender};

/// Shared state for the dashboard server.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub event_tx: EventSender,
    pub alert_threshold: f64,
}

// ─── REST response types ───────────────────────────────

#[derive(Serialize)]
struct SectorScoreRow {
    name: String,
    score: f64,
    vulnerability: Vulnerability,
    sentiment: Sentiment,
}

#[derive(Serialize)]
struct AnalysisResponse {
    timestamp: DateTime<Utc>,
    sectors: Vec<SectorScoreRow>,
    overall_risk: RiskTier,
}

#[derive(Serialize)]
struct AlertRow {
    sector: String,
    score: f64,
    severity: RiskTier,
    action: Action,
    headline: Option<String>,
}

#[derive(Serialize)]
struct AlertsResponse {
    timestamp: DateTime<Utc>,
    threshold: f64,
    alerts: Vec<AlertRow>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
pub struct SectorQuery {
    sector: Option<String>,
}

impl SectorQuery {
    fn scope(self) -> SectorScope {
        self.sector
            .filter(|s| !s.trim().is_empty())
            .map_or(SectorScope::All, SectorScope::Single)
    }
}

fn error_response(err: AnalyzerError) -> Response {
    let status = match err.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Run the pipeline and tell connected WebSocket clients about it.
async fn run_and_publish(state: &AppState, scope: &SectorScope) -> Result<Report, AnalyzerError> {
    let report = state.analyzer.run(scope).await?;
    if state
        .event_tx
        .send(DashboardEvent::analysis_complete(&report))
        .is_err()
    {
        debug!("No dashboard clients connected");
    }
    Ok(report)
}

// ─── Handlers ──────────────────────────────────────────

async fn api_analysis(
    State(state): State<AppState>,
    Query(params): Query<SectorQuery>,
) -> Response {
    let report = match run_and_publish(&state, &params.scope()).await {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };

    let sectors = report
        .sector_results
        .iter()
        .map(|r| SectorScoreRow {
            name: r.sector.clone(),
            score: r.impact_score,
            vulnerability: r.vulnerability,
            sentiment: r.sentiment,
        })
        .collect();

    Json(AnalysisResponse {
        timestamp: report.timestamp,
        sectors,
        overall_risk: report.summary.overall_risk,
    })
    .into_response()
}

async fn api_report(
    State(state): State<AppState>,
    Query(params): Query<SectorQuery>,
) -> Response {
    match run_and_publish(&state, &params.scope()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn api_alerts(State(state): State<AppState>) -> Response {
    let report = match run_and_publish(&state, &SectorScope::All).await {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };

    let alerts = report
        .high_risk_sectors(state.alert_threshold)
        .into_iter()
        .map(|r| AlertRow {
            sector: r.sector.clone(),
            score: r.impact_score,
            severity: r.recommendation.risk,
            action: r.recommendation.action,
            headline: r.relevant_news.first().map(|n| n.title.clone()),
        })
        .collect();

    Json(AlertsResponse {
        timestamp: report.timestamp,
        threshold: state.alert_threshold,
        alerts,
    })
    .into_response()
}

async fn api_history() -> Json<&'static [HistoricalEvent]> {
    Json(HISTORICAL_EVENTS)
}

async fn api_sectors(State(state): State<AppState>) -> Json<Vec<Sector>> {
    Json(state.analyzer.catalog().sectors().to_vec())
}

async fn serve_dashboard() -> impl IntoResponse {
    Html(include_str!("../static/dashboard.html"))
}

// ─── Router & server startup ───────────────────────────

fn build_router(state: AppState, password: Option<&str>) -> Router {
    let api_routes = Router::new()
        .route("/api/analysis", get(api_analysis))
        .route("/api/report", get(api_report))
        .route("/api/alerts", get(api_alerts))
        .route("/api/history", get(api_history))
        .route("/api/sectors", get(api_sectors))
        .route("/ws", get(ws_handler).with_state(state.event_tx.clone()));

    let app = Router::new()
        .route("/", get(serve_dashboard))
        .merge(api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive());

    match password {
        Some(password) => app.layer(ValidateRequestHeaderLayer::basic("admin", password)),
        None => app,
    }
}

/// Start the dashboard HTTP + WebSocket server. Runs until the listener fails.
pub async fn start_dashboard(
    config: &Config,
    analyzer: Arc<Analyzer>,
    event_tx: EventSender,
) -> Result<()> {
    let state = AppState {
        analyzer,
        event_tx,
        alert_threshold: config.alert_threshold,
    };

    let app = build_router(state, config.dashboard_password.as_deref());
    let addr = format!("0.0.0.0:{}", config.dashboard_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard to {}", addr))?;

    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .context("Dashboard server error")?;

    Ok(())
}
