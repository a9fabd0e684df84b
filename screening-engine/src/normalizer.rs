//! Name canonicalization for watchlist comparison
//!
//! Every name is folded the same way before scoring:
//! - Unicode NFKD decomposition, combining marks dropped (`é` → `e`)
//! - lower-case
//! - apostrophes deleted (`O'Brien` → `obrien`)
//! - any other punctuation becomes a token break (`Al-Rahman` → `al rahman`)
//! - whitespace collapsed, honorifics removed
//!
//! Organization names can additionally drop legal-form suffixes (`Ltd`, `GmbH`, ...).

use crate::config::NormalizerConfig;
use crate::types::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const APOSTROPHES: [char; 4] = ['\'', '\u{2019}', '`', '\u{02BC}'];

/// A canonicalized name: the joined text plus its ordered tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedName {
    text: String,
    tokens: Vec<String>,
}

impl NormalizedName {
    fn from_tokens(tokens: Vec<String>) -> Self {
        Self {
            text: tokens.join(" "),
            tokens,
        }
    }

    /// Canonical text, tokens joined by single spaces
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Ordered tokens
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// No tokens survived normalization
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Canonicalizes names for comparison. Pure, never fails.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    strip_diacritics: bool,
    honorifics: HashSet<String>,
    legal_suffixes: HashSet<String>,
}

impl NameNormalizer {
    /// Create normalizer from configuration
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            strip_diacritics: config.strip_diacritics,
            honorifics: config.honorifics.iter().map(|h| h.to_lowercase()).collect(),
            legal_suffixes: config
                .legal_suffixes
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Normalize a name. Empty or whitespace-only input yields an empty name.
    pub fn normalize(&self, name: &str) -> NormalizedName {
        NormalizedName::from_tokens(self.tokenize(name))
    }

    /// Normalize a name, also dropping legal-form suffixes for organizations
    pub fn normalize_entity(&self, name: &str, entity_type: EntityType) -> NormalizedName {
        match entity_type {
            EntityType::Individual => self.normalize(name),
            EntityType::Organization => {
                let tokens = self.tokenize(name);
                let stripped: Vec<String> = tokens
                    .iter()
                    .filter(|t| !self.legal_suffixes.contains(t.as_str()))
                    .cloned()
                    .collect();

                // "Limited Co" alone is still a name
                if stripped.is_empty() {
                    NormalizedName::from_tokens(tokens)
                } else {
                    NormalizedName::from_tokens(stripped)
                }
            }
        }
    }

    fn tokenize(&self, name: &str) -> Vec<String> {
        self.fold(name)
            .split_whitespace()
            .filter(|t| !self.honorifics.contains(*t))
            .map(str::to_string)
            .collect()
    }

    fn fold(&self, name: &str) -> String {
        let decomposed: String = if self.strip_diacritics {
            name.nfkd().filter(|c| !is_combining_mark(*c)).collect()
        } else {
            name.nfkc().collect()
        };

        let mut folded = String::with_capacity(decomposed.len());
        for c in decomposed.chars() {
            if APOSTROPHES.contains(&c) {
                continue;
            }
            if c.is_alphanumeric() {
                folded.extend(c.to_lowercase());
            } else {
                folded.push(' ');
            }
        }
        folded
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(name: &str) -> String {
        NameNormalizer::default().normalize(name).as_str().to_string()
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize("John O'Brien, Jr."), "john obrien jr");
        assert_eq!(normalize("ACME   Corp."), "acme corp");
        assert_eq!(normalize("  Mohammad Al-Rahman "), "mohammad al rahman");
    }

    #[test]
    fn test_diacritics_folded() {
        assert_eq!(normalize("José Müller"), "jose muller");
        assert_eq!(normalize("Ŝtefan Ångström"), "stefan angstrom");
    }

    #[test]
    fn test_diacritics_kept_when_disabled() {
        let config = NormalizerConfig {
            strip_diacritics: false,
            ..NormalizerConfig::default()
        };
        let normalizer = NameNormalizer::new(&config);
        assert_eq!(normalizer.normalize("José").as_str(), "josé");
    }

    #[test]
    fn test_honorifics_removed() {
        assert_eq!(normalize("Dr. Ahmed Hassan"), "ahmed hassan");
        assert_eq!(normalize("Sheikh Mohammed bin Rashid"), "mohammed bin rashid");
        assert_eq!(normalize("Mrs Jane Smith"), "jane smith");
    }

    #[test]
    fn test_tokens_are_ordered() {
        let name = NameNormalizer::default().normalize("Kim Jong Un");
        assert_eq!(name.tokens(), &["kim", "jong", "un"]);
        assert_eq!(name.char_len(), 10);
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        assert!(NameNormalizer::default().normalize("").is_empty());
        assert!(NameNormalizer::default().normalize("   \t ").is_empty());
        assert!(NameNormalizer::default().normalize("--.,").is_empty());
        assert!(NameNormalizer::default().normalize("Mr.").is_empty());
    }

    #[test]
    fn test_legal_suffixes_dropped_for_organizations() {
        let normalizer = NameNormalizer::default();
        assert_eq!(
            normalizer
                .normalize_entity("Bank Melli Iran PJSC", EntityType::Organization)
                .as_str(),
            "bank melli iran"
        );
        assert_eq!(
            normalizer
                .normalize_entity("Acme Trading Co., Ltd.", EntityType::Organization)
                .as_str(),
            "acme trading"
        );
        assert_eq!(
            normalizer
                .normalize_entity("Limited Co", EntityType::Organization)
                .as_str(),
            "limited co"
        );
        // Individuals keep every token
        assert_eq!(
            normalizer
                .normalize_entity("Sa Ltd", EntityType::Individual)
                .as_str(),
            "sa ltd"
        );
    }
}
