//! Match strength classification
//!
//! Scores are classified on the 0-100 presentation scale:
//!
//! | Tier   | Score       | Action                           |
//! |--------|-------------|----------------------------------|
//! | EXACT  | 100         | Block immediately                |
//! | HIGH   | [85, 100)   | Immediate compliance review      |
//! | MEDIUM | [70, 85)    | Thorough investigation           |
//! | LOW    | [50, 70)    | Manual verification recommended  |
//! | NONE   | [0, 50)     | No action                        |
//!
//! Date-of-birth or document agreement is reported next to the tier and never
//! changes it.

use crate::config::ClassifierConfig;
use crate::similarity::Score;
use crate::types::{
    CorroborationFlags, MatchedField, RiskTier, SanctionsMatch, ScreeningSubject,
    WatchlistCandidate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Match strength, totally ordered from NONE to EXACT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStrength {
    /// Below the LOW threshold
    None,
    /// Weak similarity
    Low,
    /// Moderate similarity
    Medium,
    /// Strong similarity
    High,
    /// Identical normalized names
    Exact,
}

impl MatchStrength {
    /// All tiers, weakest first
    pub const ALL: [MatchStrength; 5] = [
        MatchStrength::None,
        MatchStrength::Low,
        MatchStrength::Medium,
        MatchStrength::High,
        MatchStrength::Exact,
    ];

    /// Action recommended for this tier
    pub fn recommended_action(&self) -> RecommendedAction {
        match self {
            MatchStrength::Exact => RecommendedAction::Block,
            MatchStrength::High => RecommendedAction::ImmediateReview,
            MatchStrength::Medium => RecommendedAction::Investigate,
            MatchStrength::Low => RecommendedAction::ManualVerification,
            MatchStrength::None => RecommendedAction::NoAction,
        }
    }

    /// Risk tier contributed by a sanctions match of this strength
    pub fn risk_tier(&self) -> RiskTier {
        match self {
            MatchStrength::Exact | MatchStrength::High => RiskTier::High,
            MatchStrength::Medium => RiskTier::Medium,
            MatchStrength::Low => RiskTier::Low,
            MatchStrength::None => RiskTier::None,
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrength::None => "none",
            MatchStrength::Low => "low",
            MatchStrength::Medium => "medium",
            MatchStrength::High => "high",
            MatchStrength::Exact => "exact",
        }
    }
}

impl fmt::Display for MatchStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended handling of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    /// Block immediately
    Block,
    /// Immediate compliance review
    ImmediateReview,
    /// Thorough investigation
    Investigate,
    /// Manual verification recommended
    ManualVerification,
    /// No action
    NoAction,
}

impl RecommendedAction {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            RecommendedAction::Block => "Block immediately",
            RecommendedAction::ImmediateReview => "Immediate compliance review",
            RecommendedAction::Investigate => "Thorough investigation",
            RecommendedAction::ManualVerification => "Manual verification recommended",
            RecommendedAction::NoAction => "No action",
        }
    }
}

/// Maps scores to match strength. Stateless apart from its thresholds.
#[derive(Debug, Clone)]
pub struct MatchClassifier {
    thresholds: ClassifierConfig,
}

impl MatchClassifier {
    /// Create classifier from thresholds
    pub fn new(thresholds: ClassifierConfig) -> Self {
        Self { thresholds }
    }

    /// Configured thresholds
    pub fn thresholds(&self) -> &ClassifierConfig {
        &self.thresholds
    }

    /// Classify a similarity score
    pub fn classify(&self, score: Score) -> MatchStrength {
        self.classify_percent(score.as_percent())
    }

    /// Classify a score already on the 0-100 scale
    pub fn classify_percent(&self, percent: f64) -> MatchStrength {
        let t = &self.thresholds;
        if percent >= t.exact {
            MatchStrength::Exact
        } else if percent >= t.high {
            MatchStrength::High
        } else if percent >= t.medium {
            MatchStrength::Medium
        } else if percent >= t.low {
            MatchStrength::Low
        } else {
            MatchStrength::None
        }
    }

    /// Build the immutable match record, or `None` when the score classifies as NONE
    pub fn build_match(
        &self,
        candidate: &WatchlistCandidate,
        matched_field: MatchedField,
        matched_name: &str,
        score: Score,
        corroboration: CorroborationFlags,
        matched_at: DateTime<Utc>,
    ) -> Option<SanctionsMatch> {
        let strength = self.classify(score);
        if strength == MatchStrength::None {
            return None;
        }

        Some(SanctionsMatch {
            list_source: candidate.list_source.clone(),
            entry_id: candidate.entry_id.clone(),
            matched_name: matched_name.to_string(),
            matched_field,
            score: score.as_percent(),
            strength,
            corroboration,
            programs: candidate.programs.clone(),
            matched_at,
        })
    }
}

impl Default for MatchClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Compare fields other than the name
pub fn corroborate(subject: &ScreeningSubject, candidate: &WatchlistCandidate) -> CorroborationFlags {
    let dob_match = matches!(
        (subject.date_of_birth, candidate.date_of_birth),
        (Some(a), Some(b)) if a == b
    );

    let listed: HashSet<String> = candidate
        .document_numbers
        .iter()
        .map(|d| normalize_document(d))
        .filter(|d| !d.is_empty())
        .collect();
    let document_match = subject
        .document_numbers
        .iter()
        .map(|d| normalize_document(d))
        .any(|d| !d.is_empty() && listed.contains(&d));

    CorroborationFlags {
        dob_match,
        document_match,
    }
}

// Upper-case, drop separators ("ab 123-45.6" == "AB123456")
fn normalize_document(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '/'))
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityType, ListSource};
    use chrono::NaiveDate;

    #[test]
    fn test_threshold_boundaries() {
        let classifier = MatchClassifier::default();
        assert_eq!(classifier.classify_percent(100.0), MatchStrength::Exact);
        assert_eq!(classifier.classify_percent(99.99), MatchStrength::High);
        assert_eq!(classifier.classify_percent(85.0), MatchStrength::High);
        assert_eq!(classifier.classify_percent(84.99), MatchStrength::Medium);
        assert_eq!(classifier.classify_percent(70.0), MatchStrength::Medium);
        assert_eq!(classifier.classify_percent(69.99), MatchStrength::Low);
        assert_eq!(classifier.classify_percent(50.0), MatchStrength::Low);
        assert_eq!(classifier.classify_percent(49.99), MatchStrength::None);
        assert_eq!(classifier.classify_percent(0.0), MatchStrength::None);
    }

    #[test]
    fn test_classify_unit_scores() {
        let classifier = MatchClassifier::default();
        assert_eq!(classifier.classify(Score::new(0.85)), MatchStrength::High);
        assert_eq!(classifier.classify(Score::MAX), MatchStrength::Exact);
        assert_eq!(classifier.classify(Score::new(0.99)), MatchStrength::High);
    }

    #[test]
    fn test_strength_ordering_and_actions() {
        assert!(MatchStrength::Exact > MatchStrength::High);
        assert!(MatchStrength::Low > MatchStrength::None);
        assert_eq!(MatchStrength::Exact.recommended_action(), RecommendedAction::Block);
        assert_eq!(
            MatchStrength::Low.recommended_action().description(),
            "Manual verification recommended"
        );
        assert_eq!(MatchStrength::High.risk_tier(), RiskTier::High);
        assert_eq!(MatchStrength::None.risk_tier(), RiskTier::None);
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = MatchClassifier::new(ClassifierConfig {
            exact: 100.0,
            high: 90.0,
            medium: 80.0,
            low: 60.0,
        });
        assert_eq!(classifier.classify_percent(85.0), MatchStrength::Medium);
        assert_eq!(classifier.classify_percent(55.0), MatchStrength::None);
    }

    #[test]
    fn test_corroboration() {
        let dob = NaiveDate::from_ymd_opt(1967, 1, 1).unwrap();
        let subject = ScreeningSubject::new("S-1", "Viktor Bout", EntityType::Individual)
            .with_date_of_birth(dob)
            .with_document("ab 123-456");
        let candidate = WatchlistCandidate::new("OFAC-1", ListSource::Ofac, "Viktor Bout")
            .with_date_of_birth(dob)
            .with_document("AB123456");

        let flags = corroborate(&subject, &candidate);
        assert!(flags.dob_match);
        assert!(flags.document_match);
        assert!(flags.any());

        let stranger = ScreeningSubject::new("S-2", "Viktor Bout", EntityType::Individual);
        assert_eq!(corroborate(&stranger, &candidate), CorroborationFlags::default());
    }

    #[test]
    fn test_corroboration_does_not_upgrade_tier() {
        let classifier = MatchClassifier::default();
        let candidate = WatchlistCandidate::new("UN-7", ListSource::Un, "Ivan Petrov");
        let corroboration = CorroborationFlags {
            dob_match: true,
            document_match: false,
        };

        let m = classifier
            .build_match(
                &candidate,
                MatchedField::PrimaryName,
                "Ivan Petrov",
                Score::new(0.55),
                corroboration,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(m.strength, MatchStrength::Low);
        assert!(m.corroboration.dob_match);
        assert_eq!(m.score, 55.0);
    }

    #[test]
    fn test_none_strength_produces_no_match() {
        let classifier = MatchClassifier::default();
        let candidate = WatchlistCandidate::new("EU-1", ListSource::Eu, "Peter Johnson");
        let m = classifier.build_match(
            &candidate,
            MatchedField::PrimaryName,
            "Peter Johnson",
            Score::new(0.2),
            CorroborationFlags::default(),
            Utc::now(),
        );
        assert!(m.is_none());
    }
}
