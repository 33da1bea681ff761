//! Text renderings of a [`Report`]. Nothing here scores anything; every
//! function is a projection of data it is handed.

use std::fmt::Write;

use crate::catalog::{HistoricalEvent, SectorCatalog};
use crate::report::Report;
use crate::thresholds::{RiskTier, Sentiment, THRESHOLDS};

fn risk_icon(risk: RiskTier) -> &'static str {
    match risk {
        RiskTier::High => "🔴",
        RiskTier::Medium => "🟡",
        RiskTier::Low => "🟢",
    }
}

fn sentiment_label(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Negative => "🔴 Bearish",
        Sentiment::Cautious => "🟡 Cautious",
        Sentiment::Positive => "🟢 Bullish",
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Backslash-escape the characters Telegram's legacy Markdown treats as
/// entity delimiters. Use on any feed, catalog or user text outside an entity.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Chat message (Telegram Markdown).
pub fn format_message(report: &Report) -> String {
    let mut msg = String::new();
    let _ = writeln!(msg, "📊 *Tariff Impact Report*");
    let _ = writeln!(msg, "_{}_", report.timestamp.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(
        msg,
        "{} Overall risk: *{}*\n",
        risk_icon(report.summary.overall_risk),
        report.summary.overall_risk
    );

    let high_risk = report.high_risk_sectors(THRESHOLDS.high_risk_at);
    let _ = writeln!(msg, "🚨 *High risk sectors:*");
    if high_risk.is_empty() {
        let _ = writeln!(msg, "None at or above {:.1}", THRESHOLDS.high_risk_at);
    }
    for r in high_risk {
        let _ = writeln!(
            msg,
            "• {}: {:.1}/10 ({})",
            escape_markdown(&r.sector),
            r.impact_score,
            r.sentiment
        );
    }

    let recs = &report.recommendations;
    let bucket = |names: &[String]| escape_markdown(&join_or_none(names));
    let _ = writeln!(msg, "\n🔴 *Avoid:* {}", bucket(&recs.avoid));
    let _ = writeln!(msg, "🟡 *Caution:* {}", bucket(&recs.caution));
    let _ = writeln!(msg, "🟢 *Safe:* {}", bucket(&recs.safe));

    let _ = write!(
        msg,
        "\n_Based on {} news items_",
        report.summary.total_news
    );
    msg
}

/// Alert text for sectors at or above `threshold`, or `None` when nothing qualifies.
pub fn format_alert(report: &Report, threshold: f64) -> Option<String> {
    let hits = report.high_risk_sectors(threshold);
    if hits.is_empty() {
        return None;
    }

    let mut msg = String::from("🚨 *Tariff Alert*\n\n");
    for r in hits {
        let _ = writeln!(
            msg,
            "{} {}: {:.1}/10, *{}*",
            risk_icon(r.recommendation.risk),
            escape_markdown(&r.sector),
            r.impact_score,
            r.recommendation.action
        );
        // Headlines stay outside entities; escapes are not honored inside them
        if let Some(item) = r.relevant_news.first() {
            let _ = writeln!(msg, "   📰 {}", escape_markdown(&item.title));
        }
    }
    msg.push('\n');
    msg.push_str(&format_message(report));
    Some(msg)
}

/// Human-readable CLI output.
pub fn format_console(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "📊 Tariff Impact Analysis ({})\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "📈 SECTOR ANALYSIS:");
    for r in &report.sector_results {
        let _ = writeln!(
            out,
            "  {:<16} {} ({:.1}) [{} relevant, {} vulnerability]",
            r.sector,
            sentiment_label(r.sentiment),
            r.impact_score,
            r.relevant_news_count,
            r.vulnerability,
        );
        for item in &r.relevant_news {
            let _ = writeln!(out, "      - {}", item.title);
        }
    }

    let _ = writeln!(out, "\n💡 RECOMMENDATIONS:");
    for r in &report.sector_results {
        let _ = writeln!(
            out,
            "  {} {} - {} (risk {})",
            r.recommendation.action, r.sector, r.recommendation.reason, r.recommendation.risk
        );
    }

    let recs = &report.recommendations;
    let _ = writeln!(out, "\n  Avoid:   {}", join_or_none(&recs.avoid));
    let _ = writeln!(out, "  Caution: {}", join_or_none(&recs.caution));
    let _ = writeln!(out, "  Safe:    {}", join_or_none(&recs.safe));

    if !report.historical_context.is_empty() {
        let _ = writeln!(out, "\n📜 HISTORICAL CONTEXT:");
        for e in &report.historical_context {
            let _ = writeln!(out, "  {} {} ({})", e.date, e.event, e.impact);
        }
    }

    let _ = write!(
        out,
        "\nOverall risk: {} | {} news items, {} sector matches",
        report.summary.overall_risk, report.summary.total_news, report.summary.sector_matches
    );
    out
}

/// One star per two severity points, rounded up.
pub fn severity_stars(severity: u8) -> String {
    "⭐".repeat(severity.div_ceil(2) as usize)
}

pub fn format_history(events: &[HistoricalEvent]) -> String {
    let mut msg = String::from("📜 *Historical Events:*\n");
    for e in events {
        let _ = write!(
            msg,
            "\n{} {}\n   {} ({})\n",
            e.date,
            severity_stars(e.severity),
            e.event,
            e.impact
        );
    }
    msg
}

pub fn format_sectors(catalog: &SectorCatalog) -> String {
    let mut msg = String::from("📊 *Tracked Sectors:*\n\n");
    for s in catalog.sectors() {
        let _ = writeln!(
            msg,
            "• {}: {} vulnerability ({})",
            escape_markdown(&s.name),
            s.vulnerability,
            escape_markdown(&s.stocks.join(", "))
        );
    }
    msg
}
