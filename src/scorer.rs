use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{Sector, SectorCatalog, Vulnerability};
use crate::error::AnalyzerError;
use crate::news::NewsItem;
use crate::thresholds::{Action, RiskTier, Sentiment, THRESHOLDS};

/// Matching items kept verbatim on each result.
pub const MAX_RELEVANT_NEWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: Action,
    pub reason: String,
    pub risk: RiskTier,
}

impl Recommendation {
    pub(crate) fn for_score(score: f64) -> Self {
        let action = THRESHOLDS.action(score);
        let reason = match action {
            Action::Avoid => "Significant negative exposure to recent tariff news",
            Action::Caution => "Moderate tariff exposure, monitor closely",
            Action::Neutral => "Limited tariff exposure detected",
        };
        Recommendation {
            action,
            reason: reason.to_string(),
            risk: THRESHOLDS.risk_tier(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorResult {
    pub sector: String,
    pub vulnerability: Vulnerability,
    pub impact_score: f64,
    pub sentiment: Sentiment,
    pub relevant_news_count: usize,
    pub relevant_news: Vec<NewsItem>,
    pub recommendation: Recommendation,
}

/// Which sectors a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorScope {
    All,
    Single(String),
}

fn mentions_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

/// Score one sector against a news list. Keywords are expected lower-cased,
/// which [`SectorCatalog`] guarantees.
pub fn score_sector(sector: &Sector, news: &[NewsItem], tariff_keywords: &[String]) -> SectorResult {
    let mut relevant_news_count = 0usize;
    let mut relevant_news = Vec::new();

    for item in news {
        let text = item.search_text();
        if mentions_any(&text, &sector.keywords) && mentions_any(&text, tariff_keywords) {
            relevant_news_count += 1;
            if relevant_news.len() < MAX_RELEVANT_NEWS {
                relevant_news.push(item.clone());
            }
        }
    }

    // The vulnerability bonus only lifts sectors that matched something, so an
    // empty or irrelevant feed scores zero across the board.
    let bonus = if relevant_news_count > 0 && sector.vulnerability == Vulnerability::High {
        THRESHOLDS.high_vulnerability_bonus
    } else {
        0.0
    };
    let raw = relevant_news_count as f64 * THRESHOLDS.points_per_match + bonus;
    let impact_score = THRESHOLDS.clamp(raw);

    debug!(
        "{}: {} relevant items, score {:.1}",
        sector.name, relevant_news_count, impact_score
    );

    SectorResult {
        sector: sector.name.clone(),
        vulnerability: sector.vulnerability,
        impact_score,
        sentiment: THRESHOLDS.sentiment(impact_score),
        relevant_news_count,
        relevant_news,
        recommendation: Recommendation::for_score(impact_score),
    }
}

/// Sort by descending score. `sort_by` is stable, so ties keep their input order.
pub fn sort_by_impact(results: &mut [SectorResult]) {
    results.sort_by(|a, b| {
        b.impact_score
            .partial_cmp(&a.impact_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub struct SectorScorer {
    catalog: Arc<SectorCatalog>,
}

impl SectorScorer {
    pub fn new(catalog: Arc<SectorCatalog>) -> Self {
        SectorScorer { catalog }
    }

    pub fn catalog(&self) -> &SectorCatalog {
        &self.catalog
    }

    pub fn score(&self, sector_name: &str, news: &[NewsItem]) -> Result<SectorResult, AnalyzerError> {
        let sector = self
            .catalog
            .get(sector_name)
            .ok_or_else(|| AnalyzerError::UnknownSector(sector_name.to_string()))?;
        Ok(score_sector(sector, news, self.catalog.tariff_keywords()))
    }

    /// Every catalog sector, highest impact first; ties stay in catalog order.
    pub fn score_all(&self, news: &[NewsItem]) -> Vec<SectorResult> {
        let mut results: Vec<SectorResult> = self
            .catalog
            .sectors()
            .iter()
            .map(|s| score_sector(s, news, self.catalog.tariff_keywords()))
            .collect();
        sort_by_impact(&mut results);

        info!(
            "Scored {} sectors against {} news items",
            results.len(),
            news.len()
        );
        results
    }

    pub fn score_scope(
        &self,
        scope: &SectorScope,
        news: &[NewsItem],
    ) -> Result<Vec<SectorResult>, AnalyzerError> {
        match scope {
            SectorScope::All => Ok(self.score_all(news)),
            SectorScope::Single(name) => Ok(vec![self.score(name, news)?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SectorScorer {
        SectorScorer::new(Arc::new(SectorCatalog::builtin().unwrap()))
    }

    fn agriculture_news() -> Vec<NewsItem> {
        vec![NewsItem::new(
            "China tariffs on US agriculture",
            "25% tariff on soybean imports",
        )]
    }

    #[test]
    fn test_agriculture_scenario() {
        let result = scorer().score("Agriculture", &agriculture_news()).unwrap();
        assert_eq!(result.relevant_news_count, 1);
        assert_eq!(result.impact_score, 4.0);
        assert_eq!(result.sentiment, Sentiment::Cautious);
        assert_eq!(result.recommendation.action, Action::Caution);
        assert_eq!(result.recommendation.risk, RiskTier::Medium);
        assert_eq!(result.relevant_news.len(), 1);
    }

    #[test]
    fn test_pharmaceuticals_scenario() {
        let result = scorer()
            .score("Pharmaceuticals", &agriculture_news())
            .unwrap();
        assert_eq!(result.relevant_news_count, 0);
        assert_eq!(result.impact_score, 0.0);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.recommendation.action, Action::Neutral);
        assert_eq!(result.recommendation.risk, RiskTier::Low);
    }

    #[test]
    fn test_unknown_sector() {
        let err = scorer().score("Crypto", &agriculture_news()).unwrap_err();
        assert!(matches!(err, AnalyzerError::UnknownSector(ref s) if s == "Crypto"));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_empty_news_scores_zero_everywhere() {
        for result in scorer().score_all(&[]) {
            assert_eq!(result.impact_score, 0.0, "{}", result.sector);
            assert_eq!(result.sentiment, Sentiment::Positive);
            assert!(result.relevant_news.is_empty());
        }
    }

    #[test]
    fn test_sector_keyword_without_tariff_keyword_is_ignored() {
        let news = vec![NewsItem::new("Soybean harvest strong", "Agriculture output up")];
        let result = scorer().score("Agriculture", &news).unwrap();
        assert_eq!(result.relevant_news_count, 0);
        assert_eq!(result.impact_score, 0.0);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let news = vec![NewsItem::new("STEEL TARIFF", "")];
        let result = scorer().score("manufacturing", &news).unwrap();
        assert_eq!(result.relevant_news_count, 1);
        assert_eq!(result.sector, "Manufacturing");
    }

    #[test]
    fn test_score_saturates_at_ten() {
        let news: Vec<NewsItem> = (0..20)
            .map(|i| NewsItem::new(format!("Steel tariff #{}", i), ""))
            .collect();
        let result = scorer().score("Manufacturing", &news).unwrap();
        assert_eq!(result.relevant_news_count, 20);
        assert_eq!(result.impact_score, 10.0);
        assert_eq!(result.relevant_news.len(), MAX_RELEVANT_NEWS);
        assert_eq!(result.relevant_news[0].title, "Steel tariff #0");
        assert_eq!(result.relevant_news[2].title, "Steel tariff #2");
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.recommendation.action, Action::Avoid);
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        let s = scorer();
        let mut news = Vec::new();
        for n in 0..12 {
            for result in s.score_all(&news) {
                assert!((0.0..=10.0).contains(&result.impact_score));
            }
            news.push(NewsItem::new(
                format!("Trade war item {}", n),
                "tariffs on steel, oil, soy, chips, pharma and retail goods",
            ));
        }
    }

    #[test]
    fn test_adding_matching_item_never_decreases_score() {
        let s = scorer();
        let mut news = Vec::new();
        let mut last = s.score("Energy", &news).unwrap().impact_score;
        for _ in 0..8 {
            news.push(NewsItem::new("Oil tariffs", "import tax on crude"));
            let next = s.score("Energy", &news).unwrap().impact_score;
            assert!(next >= last);
            last = next;
        }
        assert_eq!(last, 10.0);
    }

    #[test]
    fn test_score_all_sorted_with_stable_ties() {
        let results = scorer().score_all(&agriculture_news());
        let names: Vec<&str> = results.iter().map(|r| r.sector.as_str()).collect();
        // Agriculture 4.0, everything else tied at 0.0 in catalog order.
        assert_eq!(
            names,
            vec![
                "Agriculture",
                "Technology",
                "Manufacturing",
                "Automotive",
                "Energy",
                "Retail",
                "Pharmaceuticals"
            ]
        );
    }

    #[test]
    fn test_score_scope_single() {
        let s = scorer();
        let results = s
            .score_scope(&SectorScope::Single("agriculture".into()), &agriculture_news())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(s
            .score_scope(&SectorScope::Single("Crypto".into()), &[])
            .is_err());
        assert_eq!(s.score_scope(&SectorScope::All, &[]).unwrap().len(), 7);
    }
}
