use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::High => write!(f, "HIGH"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Negative,
    Cautious,
    Positive,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Negative => write!(f, "NEGATIVE"),
            Sentiment::Cautious => write!(f, "CAUTIOUS"),
            Sentiment::Positive => write!(f, "POSITIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Avoid,
    Caution,
    Neutral,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Avoid => write!(f, "AVOID"),
            Action::Caution => write!(f, "CAUTION"),
            Action::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Recommendation bucket a sector lands in at report level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Avoid,
    Caution,
    Safe,
}

/// Every score cut-off used by the scorer, the report assembler and the
/// message formatter. Bucketing and per-sector recommendations both read
/// `avoid_at` / `caution_at`, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactThresholds {
    /// score >= avoid_at: HIGH risk, AVOID, avoid bucket
    pub avoid_at: f64,
    /// score >= caution_at: MEDIUM risk, CAUTION, caution bucket
    pub caution_at: f64,
    /// score > negative_above: NEGATIVE sentiment, HIGH overall risk
    pub negative_above: f64,
    /// score > cautious_above: CAUTIOUS sentiment, MEDIUM overall risk
    pub cautious_above: f64,
    /// score >= high_risk_at: listed as high risk and alerted on
    pub high_risk_at: f64,
    pub points_per_match: f64,
    pub high_vulnerability_bonus: f64,
    pub max_score: f64,
}

pub const THRESHOLDS: ImpactThresholds = ImpactThresholds {
    avoid_at: 7.0,
    caution_at: 4.0,
    negative_above: 6.0,
    cautious_above: 3.0,
    high_risk_at: 5.0,
    points_per_match: 2.0,
    high_vulnerability_bonus: 2.0,
    max_score: 10.0,
};

impl ImpactThresholds {
    pub fn clamp(&self, score: f64) -> f64 {
        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, self.max_score)
    }

    pub fn risk_tier(&self, score: f64) -> RiskTier {
        if score >= self.avoid_at {
            RiskTier::High
        } else if score >= self.caution_at {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn action(&self, score: f64) -> Action {
        match self.risk_tier(score) {
            RiskTier::High => Action::Avoid,
            RiskTier::Medium => Action::Caution,
            RiskTier::Low => Action::Neutral,
        }
    }

    pub fn bucket(&self, score: f64) -> Bucket {
        match self.risk_tier(score) {
            RiskTier::High => Bucket::Avoid,
            RiskTier::Medium => Bucket::Caution,
            RiskTier::Low => Bucket::Safe,
        }
    }

    pub fn sentiment(&self, score: f64) -> Sentiment {
        if score > self.negative_above {
            Sentiment::Negative
        } else if score > self.cautious_above {
            Sentiment::Cautious
        } else {
            Sentiment::Positive
        }
    }

    /// Market-wide risk, derived from the highest sector score.
    pub fn overall_risk(&self, top_score: f64) -> RiskTier {
        match self.sentiment(top_score) {
            Sentiment::Negative => RiskTier::High,
            Sentiment::Cautious => RiskTier::Medium,
            Sentiment::Positive => RiskTier::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_boundaries() {
        assert_eq!(THRESHOLDS.risk_tier(7.0), RiskTier::High);
        assert_eq!(THRESHOLDS.risk_tier(6.9), RiskTier::Medium);
        assert_eq!(THRESHOLDS.risk_tier(4.0), RiskTier::Medium);
        assert_eq!(THRESHOLDS.risk_tier(3.9), RiskTier::Low);
        assert_eq!(THRESHOLDS.risk_tier(0.0), RiskTier::Low);
    }

    #[test]
    fn test_action_and_bucket_follow_risk_tier() {
        for score in [0.0, 2.0, 4.0, 5.5, 7.0, 10.0] {
            let expected = match THRESHOLDS.risk_tier(score) {
                RiskTier::High => (Action::Avoid, Bucket::Avoid),
                RiskTier::Medium => (Action::Caution, Bucket::Caution),
                RiskTier::Low => (Action::Neutral, Bucket::Safe),
            };
            assert_eq!((THRESHOLDS.action(score), THRESHOLDS.bucket(score)), expected);
        }
    }

    #[test]
    fn test_sentiment_boundaries() {
        assert_eq!(THRESHOLDS.sentiment(6.1), Sentiment::Negative);
        assert_eq!(THRESHOLDS.sentiment(6.0), Sentiment::Cautious);
        assert_eq!(THRESHOLDS.sentiment(3.1), Sentiment::Cautious);
        assert_eq!(THRESHOLDS.sentiment(3.0), Sentiment::Positive);
    }

    #[test]
    fn test_overall_risk() {
        assert_eq!(THRESHOLDS.overall_risk(8.0), RiskTier::High);
        assert_eq!(THRESHOLDS.overall_risk(4.0), RiskTier::Medium);
        assert_eq!(THRESHOLDS.overall_risk(2.0), RiskTier::Low);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(THRESHOLDS.clamp(14.0), 10.0);
        assert_eq!(THRESHOLDS.clamp(-1.0), 0.0);
        assert_eq!(THRESHOLDS.clamp(f64::NAN), 0.0);
        assert_eq!(THRESHOLDS.clamp(4.0), 4.0);
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_value(RiskTier::High).unwrap(), "HIGH");
        assert_eq!(serde_json::to_value(Sentiment::Cautious).unwrap(), "CAUTIOUS");
        assert_eq!(serde_json::to_value(Action::Neutral).unwrap(), "NEUTRAL");
    }
}
