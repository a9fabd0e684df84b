//! Compound name similarity
//!
//! Three independent signals are computed for every pair of normalized names:
//!
//! 1. **Edit distance**: `1 - levenshtein(a, b) / max(len(a), len(b))`
//! 2. **Phonetic agreement**: any token pair shares a Double Metaphone code,
//!    or, as a fallback, a Soundex code (catches `mohammad` / `muhammad`)
//! 3. **Token-set overlap**: shared tokens over the larger token set
//!    (catches re-ordered names and omitted middle names)
//!
//! The edit-distance similarity is the base score. Phonetic agreement and a
//! strong token overlap add fixed boosts, and the sum is clamped to `[0, 1]`.
//! Each signal is kept in [`ScoreBreakdown`] so a compliance reviewer can see
//! why a pair scored the way it did.

use crate::config::ScorerConfig;
use crate::normalizer::NormalizedName;
use rphonetic::{DoubleMetaphone, Encoder, Soundex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Similarity score in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    /// Lowest possible score
    pub const ZERO: Score = Score(0.0);

    /// Highest possible score, reserved for identical names
    pub const MAX: Score = Score(1.0);

    /// Create a score, clamping into `[0, 1]`
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Raw value in `[0, 1]`
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Value on the 0-100 presentation scale, rounded to two decimals
    pub fn as_percent(&self) -> f64 {
        (self.0 * 10_000.0).round() / 100.0
    }
}

impl TryFrom<f64> for Score {
    type Error = String;

    // Stored scores are rejected, not clamped, when out of range
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("score {} is outside [0, 1]", value))
        }
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> f64 {
        score.0
    }
}

/// Every signal that contributed to a score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Levenshtein-based similarity in `[0, 1]`
    pub edit_similarity: f64,
    /// Some token pair agrees phonetically
    pub phonetic_agreement: bool,
    /// Shared tokens over the larger token set
    pub token_overlap: f64,
    /// `token_overlap` reached the strong-match ratio
    pub strong_token_match: bool,
    /// Final score
    pub score: Score,
}

impl ScoreBreakdown {
    fn empty() -> Self {
        Self {
            edit_similarity: 0.0,
            phonetic_agreement: false,
            token_overlap: 0.0,
            strong_token_match: false,
            score: Score::ZERO,
        }
    }

    /// Additive blend of the signals, clamped to `[0, 1]`
    pub fn blended(&self, config: &ScorerConfig) -> f64 {
        let mut total = self.edit_similarity;
        if self.phonetic_agreement {
            total += config.phonetic_boost;
        }
        if self.strong_token_match {
            total += config.token_boost;
        }
        total.clamp(0.0, 1.0)
    }
}

/// Best-scoring pairing across several spellings of two names
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestPair {
    /// Index into the left-hand names
    pub left: usize,
    /// Index into the right-hand names
    pub right: usize,
    /// Score of that pairing
    pub breakdown: ScoreBreakdown,
}

struct TokenCodes<'a> {
    token: &'a str,
    metaphone: Option<String>,
    soundex: Option<String>,
}

/// Multi-algorithm name similarity scorer
pub struct SimilarityScorer {
    config: ScorerConfig,
    metaphone: DoubleMetaphone,
    soundex: Soundex,
}

impl std::fmt::Debug for SimilarityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityScorer")
            .field("config", &self.config)
            .finish()
    }
}

impl SimilarityScorer {
    /// Create scorer from configuration
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            config,
            metaphone: DoubleMetaphone::default(),
            soundex: Soundex::default(),
        }
    }

    /// Scorer configuration
    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Similarity of two normalized names
    pub fn score(&self, a: &NormalizedName, b: &NormalizedName) -> Score {
        self.breakdown(a, b).score
    }

    /// Similarity of two normalized names with each contributing signal
    pub fn breakdown(&self, a: &NormalizedName, b: &NormalizedName) -> ScoreBreakdown {
        if a.is_empty() || b.is_empty() {
            return ScoreBreakdown::empty();
        }

        let mut breakdown = ScoreBreakdown {
            edit_similarity: edit_similarity(a, b),
            phonetic_agreement: self.phonetic_agreement(a, b),
            token_overlap: token_overlap(a, b),
            strong_token_match: false,
            score: Score::ZERO,
        };
        breakdown.strong_token_match = breakdown.token_overlap >= self.config.strong_token_ratio;

        let blended = breakdown.blended(&self.config);
        breakdown.score = if a.as_str() == b.as_str() {
            Score::MAX
        } else {
            Score::new(blended.min(self.config.near_identity_ceiling))
        };
        breakdown
    }

    /// Best pairing across all spellings of two names (primary name and aliases)
    pub fn best_of(&self, left: &[NormalizedName], right: &[NormalizedName]) -> Option<BestPair> {
        let mut best: Option<BestPair> = None;
        for (i, a) in left.iter().enumerate() {
            for (j, b) in right.iter().enumerate() {
                let breakdown = self.breakdown(a, b);
                let better = match &best {
                    Some(current) => breakdown.score > current.breakdown.score,
                    None => true,
                };
                if better {
                    best = Some(BestPair {
                        left: i,
                        right: j,
                        breakdown,
                    });
                }
            }
        }
        best
    }

    fn phonetic_agreement(&self, a: &NormalizedName, b: &NormalizedName) -> bool {
        let codes_a = self.encode_tokens(a);
        let codes_b = self.encode_tokens(b);

        codes_a.iter().any(|x| {
            codes_b.iter().any(|y| {
                x.token == y.token
                    || codes_agree(&x.metaphone, &y.metaphone)
                    || codes_agree(&x.soundex, &y.soundex)
            })
        })
    }

    fn encode_tokens<'a>(&self, name: &'a NormalizedName) -> Vec<TokenCodes<'a>> {
        name.tokens()
            .iter()
            .map(|token| {
                // Phonetic encoders are defined over the Latin alphabet only
                let encodable = !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic());
                TokenCodes {
                    token: token.as_str(),
                    metaphone: encodable.then(|| self.metaphone.encode(token)),
                    soundex: encodable.then(|| self.soundex.encode(token)),
                }
            })
            .collect()
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(ScorerConfig::default())
    }
}

fn codes_agree(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// `1 - levenshtein / max_len`; 0 against an empty name, 1 for identical names
pub fn edit_similarity(a: &NormalizedName, b: &NormalizedName) -> f64 {
    let max_len = a.char_len().max(b.char_len());
    if a.is_empty() || b.is_empty() || max_len == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(a.as_str(), b.as_str());
    1.0 - distance as f64 / max_len as f64
}

/// Shared distinct tokens divided by the larger distinct-token count
pub fn token_overlap(a: &NormalizedName, b: &NormalizedName) -> f64 {
    let set_a: HashSet<&str> = a.tokens().iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.tokens().iter().map(String::as_str).collect();

    let larger = set_a.len().max(set_b.len());
    if larger == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / larger as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NameNormalizer;
    use proptest::prelude::*;

    fn name(s: &str) -> NormalizedName {
        NameNormalizer::default().normalize(s)
    }

    #[test]
    fn test_edit_similarity() {
        assert_eq!(edit_similarity(&name("John Smith"), &name("John Smith")), 1.0);
        assert_eq!(edit_similarity(&name("kitten"), &name("sitting")), 1.0 - 3.0 / 7.0);
        assert_eq!(edit_similarity(&name(""), &name("")), 0.0);
        assert_eq!(edit_similarity(&name("John"), &name("")), 0.0);
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap(&name("John Smith"), &name("Smith John")), 1.0);
        assert!((token_overlap(&name("Mohammad Al Rahman"), &name("Mohammed Al Rahman")) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_overlap(&name("John Smith"), &name("Peter Johnson")), 0.0);
        // Duplicates collapse, keeping the ratio symmetric
        assert_eq!(
            token_overlap(&name("Ali Ali"), &name("Ali Hassan")),
            token_overlap(&name("Ali Hassan"), &name("Ali Ali"))
        );
    }

    #[test]
    fn test_phonetic_agreement_on_transliteration() {
        let scorer = SimilarityScorer::default();
        let breakdown = scorer.breakdown(&name("Mohammad"), &name("Mohammed"));
        assert!(breakdown.phonetic_agreement);

        let breakdown = scorer.breakdown(&name("Smith"), &name("Smyth"));
        assert!(breakdown.phonetic_agreement);
    }

    #[test]
    fn test_identical_names_score_max() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score(&name("Bank Melli Iran"), &name("BANK MELLI, Iran")), Score::MAX);
    }

    #[test]
    fn test_empty_names_score_zero() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score(&name(""), &name("John")), Score::ZERO);
        assert_eq!(scorer.score(&name(""), &name("")), Score::ZERO);
    }

    #[test]
    fn test_boosts_clamp_to_one() {
        let config = ScorerConfig::default();
        let breakdown = ScoreBreakdown {
            edit_similarity: 0.95,
            phonetic_agreement: true,
            token_overlap: 1.0,
            strong_token_match: true,
            score: Score::ZERO,
        };
        assert_eq!(breakdown.blended(&config), 1.0);
    }

    #[test]
    fn test_non_identical_pair_stays_below_max() {
        let scorer = SimilarityScorer::default();
        let breakdown = scorer.breakdown(&name("Mohammad Al-Rahman"), &name("Mohammed Al Rahman"));
        assert!(breakdown.edit_similarity > 0.85 && breakdown.edit_similarity < 0.96);
        assert!(breakdown.phonetic_agreement);
        assert_eq!(breakdown.blended(scorer.config()), 1.0);
        assert_eq!(breakdown.score.value(), 0.99);
        assert!(breakdown.score < Score::MAX);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let scorer = SimilarityScorer::default();
        let breakdown = scorer.breakdown(&name("John Smith"), &name("Peter Johnson"));
        assert!(!breakdown.phonetic_agreement);
        assert_eq!(breakdown.token_overlap, 0.0);
        assert!(breakdown.score.as_percent() < 50.0);
    }

    #[test]
    fn test_reordered_names_get_token_boost() {
        let scorer = SimilarityScorer::default();
        let breakdown = scorer.breakdown(&name("Kim Jong Un"), &name("Un Kim Jong"));
        assert!(breakdown.strong_token_match);
        assert!(breakdown.score.value() > breakdown.edit_similarity);
    }

    #[test]
    fn test_best_of_prefers_alias() {
        let scorer = SimilarityScorer::default();
        let subject = vec![name("Viktor Bout")];
        let listed = vec![name("Victor Anatolyevich Bout"), name("Viktor Bout")];
        let best = scorer.best_of(&subject, &listed).unwrap();
        assert_eq!(best.right, 1);
        assert_eq!(best.breakdown.score, Score::MAX);
        assert!(scorer.best_of(&[], &listed).is_none());
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(Score::new(0.85).as_percent(), 85.0);
        assert_eq!(Score::new(0.70).as_percent(), 70.0);
        assert_eq!(Score::new(1.7).value(), 1.0);
        assert_eq!(Score::new(-0.2).value(), 0.0);
        assert_eq!(Score::new(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_deserialized_score_is_range_checked() {
        let score: Score = serde_json::from_str("0.85").unwrap();
        assert_eq!(score.value(), 0.85);
        assert_eq!(serde_json::to_string(&score).unwrap(), "0.85");

        assert!(serde_json::from_str::<Score>("1.7").is_err());
        assert!(serde_json::from_str::<Score>("-0.1").is_err());
    }

    proptest! {
        #[test]
        fn prop_score_is_reflexive(s in "[A-Za-z][A-Za-z '-]{0,30}") {
            let scorer = SimilarityScorer::default();
            let n = name(&s);
            prop_assume!(!n.is_empty());
            prop_assert_eq!(scorer.score(&n, &n), Score::MAX);
        }

        #[test]
        fn prop_score_is_symmetric(a in "[A-Za-z ]{0,24}", b in "[A-Za-z ]{0,24}") {
            let scorer = SimilarityScorer::default();
            let (na, nb) = (name(&a), name(&b));
            prop_assert_eq!(scorer.score(&na, &nb), scorer.score(&nb, &na));
        }

        #[test]
        fn prop_score_in_unit_range(a in "\\PC{0,24}", b in "\\PC{0,24}") {
            let scorer = SimilarityScorer::default();
            let v = scorer.score(&name(&a), &name(&b)).value();
            prop_assert!((0.0..=1.0).contains(&v));
        }

        #[test]
        fn prop_max_only_for_identical(a in "[a-z]{1,8}( [a-z]{1,8}){0,2}", b in "[a-z]{1,8}( [a-z]{1,8}){0,2}") {
            let scorer = SimilarityScorer::default();
            let (na, nb) = (name(&a), name(&b));
            prop_assume!(!na.is_empty() && !nb.is_empty());
            let is_max = scorer.score(&na, &nb) == Score::MAX;
            prop_assert_eq!(is_max, na.as_str() == nb.as_str());
        }
    }
}
