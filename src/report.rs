use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::{historical_prefix, HistoricalEvent};
use crate::news::NewsItem;
use crate::scorer::SectorResult;
use crate::thresholds::{Bucket, RiskTier, THRESHOLDS};

pub const DEFAULT_HISTORY_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_news: usize,
    /// Sum of per-sector match counts; one item can count for several sectors.
    pub sector_matches: usize,
    pub sectors_analyzed: usize,
    pub avoid_count: usize,
    pub caution_count: usize,
    pub safe_count: usize,
    pub top_sector: Option<String>,
    pub overall_risk: RiskTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendations {
    pub avoid: Vec<String>,
    pub caution: Vec<String>,
    pub safe: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub summary: Summary,
    pub sector_results: Vec<SectorResult>,
    pub historical_context: Vec<HistoricalEvent>,
    pub recommendations: Recommendations,
}

impl Report {
    /// Results at or above `threshold`, in report order.
    pub fn high_risk_sectors(&self, threshold: f64) -> Vec<&SectorResult> {
        self.sector_results
            .iter()
            .filter(|r| r.impact_score >= threshold)
            .collect()
    }

    pub fn top_score(&self) -> f64 {
        self.sector_results
            .iter()
            .map(|r| r.impact_score)
            .fold(0.0, f64::max)
    }
}

pub struct ReportAssembler {
    history_depth: usize,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl ReportAssembler {
    pub fn new(history_depth: usize) -> Self {
        ReportAssembler { history_depth }
    }

    pub fn assemble(&self, results: Vec<SectorResult>, news: &[NewsItem]) -> Report {
        self.assemble_at(results, news, Utc::now())
    }

    /// `results` are embedded in the order given (`score_all` already sorts them).
    pub fn assemble_at(
        &self,
        results: Vec<SectorResult>,
        news: &[NewsItem],
        timestamp: DateTime<Utc>,
    ) -> Report {
        let mut recommendations = Recommendations::default();
        for result in &results {
            let bucket = match THRESHOLDS.bucket(result.impact_score) {
                Bucket::Avoid => &mut recommendations.avoid,
                Bucket::Caution => &mut recommendations.caution,
                Bucket::Safe => &mut recommendations.safe,
            };
            bucket.push(result.sector.clone());
        }

        let top = results.iter().fold(None::<&SectorResult>, |best, r| match best {
            Some(b) if b.impact_score >= r.impact_score => Some(b),
            _ => Some(r),
        });
        let top_score = top.map(|r| r.impact_score).unwrap_or(0.0);

        let summary = Summary {
            total_news: news.len(),
            sector_matches: results.iter().map(|r| r.relevant_news_count).sum(),
            sectors_analyzed: results.len(),
            avoid_count: recommendations.avoid.len(),
            caution_count: recommendations.caution.len(),
            safe_count: recommendations.safe.len(),
            top_sector: top
                .filter(|r| r.impact_score > 0.0)
                .map(|r| r.sector.clone()),
            overall_risk: THRESHOLDS.overall_risk(top_score),
        };

        info!(
            "Report assembled: {} sectors, overall risk {} (avoid {}, caution {}, safe {})",
            summary.sectors_analyzed,
            summary.overall_risk,
            summary.avoid_count,
            summary.caution_count,
            summary.safe_count,
        );

        Report {
            timestamp,
            summary,
            sector_results: results,
            historical_context: historical_prefix(self.history_depth),
            recommendations,
        }
    }
}

/// Write `report` as pretty JSON to `<dir>/tariff-report-<YYYYMMDD-HHMMSS-mmm>.json`.
///
/// An existing file with the same name is never overwritten.
pub fn write_report(dir: impl AsRef<Path>, report: &Report) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = dir.join(format!(
        "tariff-report-{}.json",
        report.timestamp.format("%Y%m%d-%H%M%S-%3f")
    ));
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    info!("Report saved to {}", path.display());
    Ok(path)
}
