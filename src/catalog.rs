use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::AnalyzerError;

/// Structural exposure of a sector to tariff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vulnerability {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vulnerability::High => write!(f, "HIGH"),
            Vulnerability::Medium => write!(f, "MEDIUM"),
            Vulnerability::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub name: String,
    pub stocks: Vec<String>,
    pub keywords: Vec<String>,
    pub vulnerability: Vulnerability,
}

/// Tariff vocabulary an item must mention before any sector counts it.
pub const TARIFF_KEYWORDS: &[&str] = &[
    "tariff",
    "tariffs",
    "trade war",
    "customs duty",
    "import tax",
];

/// (name, tickers, keywords, vulnerability)
const BUILTIN_SECTORS: &[(&str, &[&str], &[&str], Vulnerability)] = &[
    (
        "Technology",
        &["AAPL", "MSFT", "GOOGL", "META", "NVDA"],
        &["technology", "tech", "semiconductor", "chip", "electronics", "smartphone"],
        Vulnerability::High,
    ),
    (
        "Manufacturing",
        &["CAT", "DE", "BA", "GE"],
        &["manufacturing", "steel", "aluminum", "industrial", "machinery", "factory"],
        Vulnerability::High,
    ),
    (
        "Agriculture",
        &["ADM", "BG", "MOS"],
        &["agriculture", "soy", "pork", "farm", "grain", "crop"],
        Vulnerability::High,
    ),
    (
        "Automotive",
        &["F", "GM", "TM"],
        &["automotive", "automaker", "vehicle", "auto parts", "electric car"],
        Vulnerability::High,
    ),
    (
        "Energy",
        &["XOM", "CVX", "COP"],
        &["energy", "oil", "natural gas", "lng", "solar", "crude"],
        Vulnerability::Medium,
    ),
    (
        "Retail",
        &["WMT", "TGT", "COST"],
        &["retail", "retailer", "consumer goods", "apparel", "shoppers"],
        Vulnerability::Medium,
    ),
    (
        "Pharmaceuticals",
        &["JNJ", "PFE", "MRK"],
        &["pharmaceutical", "pharma", "drug", "medicine"],
        Vulnerability::Low,
    ),
];

#[derive(Deserialize)]
struct CatalogFile {
    sectors: Vec<Sector>,
    #[serde(default)]
    tariff_keywords: Option<Vec<String>>,
}

/// Validated, read-only sector catalog plus the tariff keyword list.
#[derive(Debug, Clone, Serialize)]
pub struct SectorCatalog {
    sectors: Vec<Sector>,
    tariff_keywords: Vec<String>,
}

fn normalize(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.trim().to_lowercase()).collect()
}

impl SectorCatalog {
    /// Validate and normalize a catalog. Keywords are stored trimmed and lower-cased.
    pub fn new(sectors: Vec<Sector>, tariff_keywords: Vec<String>) -> Result<Self, AnalyzerError> {
        if sectors.is_empty() {
            return Err(AnalyzerError::Config("catalog has no sectors".into()));
        }

        let tariff_keywords = normalize(&tariff_keywords);
        if tariff_keywords.is_empty() || tariff_keywords.iter().any(|k| k.is_empty()) {
            return Err(AnalyzerError::Config(
                "tariff keyword list must be non-empty and contain no blank entries".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(sectors.len());
        for mut sector in sectors {
            let name = sector.name.trim().to_string();
            if name.is_empty() {
                return Err(AnalyzerError::Config("sector with empty name".into()));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(AnalyzerError::Config(format!("duplicate sector '{}'", name)));
            }
            if sector.stocks.is_empty() {
                return Err(AnalyzerError::Config(format!("sector '{}' has no stocks", name)));
            }
            sector.keywords = normalize(&sector.keywords);
            if sector.keywords.is_empty() || sector.keywords.iter().any(|k| k.is_empty()) {
                return Err(AnalyzerError::Config(format!(
                    "sector '{}' needs at least one non-blank keyword",
                    name
                )));
            }
            sector.name = name;
            normalized.push(sector);
        }

        Ok(SectorCatalog {
            sectors: normalized,
            tariff_keywords,
        })
    }

    pub fn builtin() -> Result<Self, AnalyzerError> {
        let sectors = BUILTIN_SECTORS
            .iter()
            .map(|(name, stocks, keywords, vulnerability)| Sector {
                name: name.to_string(),
                stocks: stocks.iter().map(|s| s.to_string()).collect(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                vulnerability: *vulnerability,
            })
            .collect();
        let tariff_keywords = TARIFF_KEYWORDS.iter().map(|k| k.to_string()).collect();
        Self::new(sectors, tariff_keywords)
    }

    /// Load a catalog from a JSON file of the form
    /// `{"sectors": [...], "tariff_keywords": [...]}`; the keyword list is optional.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .map_err(|e| AnalyzerError::Config(format!("{}: {}", path.display(), e)))?;
        let tariff_keywords = file
            .tariff_keywords
            .unwrap_or_else(|| TARIFF_KEYWORDS.iter().map(|k| k.to_string()).collect());
        let catalog = Self::new(file.sectors, tariff_keywords)?;
        info!(
            "Loaded {} sectors from {}",
            catalog.sectors.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Built-in catalog unless a path is given.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::builtin()?),
        }
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn tariff_keywords(&self) -> &[String] {
        &self.tariff_keywords
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Case-insensitive lookup by sector name.
    pub fn get(&self, name: &str) -> Option<&Sector> {
        let name = name.trim();
        self.sectors
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// A past tariff episode, used as narrative context in reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoricalEvent {
    pub date: &'static str,
    pub event: &'static str,
    pub impact: &'static str,
    pub sector: &'static str,
    pub severity: u8,
}

/// Oldest first.
pub const HISTORICAL_EVENTS: &[HistoricalEvent] = &[
    HistoricalEvent {
        date: "2018-03-01",
        event: "Trump announces steel tariffs (25%)",
        impact: "Steel +25%, Markets -2%",
        sector: "Manufacturing",
        severity: 8,
    },
    HistoricalEvent {
        date: "2018-04-02",
        event: "China tariffs on pork",
        impact: "Pork sector -8%",
        sector: "Agriculture",
        severity: 6,
    },
    HistoricalEvent {
        date: "2018-07-06",
        event: "China tariffs on $34B goods",
        impact: "China markets -4%",
        sector: "Multiple",
        severity: 7,
    },
    HistoricalEvent {
        date: "2019-05-10",
        event: "China tariffs increased to 25%",
        impact: "Markets -3%",
        sector: "Multiple",
        severity: 9,
    },
    HistoricalEvent {
        date: "2024-05-14",
        event: "China EV tariffs (100%)",
        impact: "EV sector -6%",
        sector: "Automotive",
        severity: 8,
    },
    HistoricalEvent {
        date: "2026-02-01",
        event: "Steel/Aluminum tariffs announced",
        impact: "Industrial metals importers -5%",
        sector: "Manufacturing",
        severity: 7,
    },
];

/// First `n` historical events (fewer if the list is shorter).
pub fn historical_prefix(n: usize) -> Vec<HistoricalEvent> {
    HISTORICAL_EVENTS.iter().take(n).copied().collect()
}
