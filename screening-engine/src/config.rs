//! Configuration for the screening engine

use crate::classifier::MatchStrength;
use crate::error::{Result, ScreeningError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Screening engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name normalization
    pub normalizer: NormalizerConfig,

    /// Similarity blending
    pub scorer: ScorerConfig,

    /// Match strength thresholds
    pub classifier: ClassifierConfig,

    /// PEP risk derivation
    pub pep: PepConfig,

    /// Screening orchestration
    pub orchestrator: OrchestratorConfig,

    /// Rescreening scheduler
    pub scheduler: SchedulerConfig,
}

/// Name normalization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Fold accented letters to their base letter
    pub strip_diacritics: bool,

    /// Titles dropped from names (lower-case, without punctuation)
    pub honorifics: Vec<String>,

    /// Legal-form suffixes dropped from organization names
    pub legal_suffixes: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let honorifics = [
            "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "sir", "dame", "lord", "lady", "hon",
            "rev", "sheikh", "shaikh", "haji", "hajji", "herr", "frau", "mme", "mlle",
        ];
        let legal_suffixes = [
            "inc", "incorporated", "corp", "corporation", "llc", "ltd", "limited", "plc", "sa",
            "ag", "gmbh", "co", "company", "lp", "llp", "nv", "bv", "sarl", "sas", "pjsc", "ojsc",
            "jsc", "fzco", "fze", "pte", "pty",
        ];
        Self {
            strip_diacritics: true,
            honorifics: honorifics.iter().map(|s| s.to_string()).collect(),
            legal_suffixes: legal_suffixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Similarity blending configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Additive boost when any token pair agrees phonetically
    pub phonetic_boost: f64,

    /// Additive boost when token-set overlap reaches `strong_token_ratio`
    pub token_boost: f64,

    /// Token-set overlap ratio considered a strong token match
    pub strong_token_ratio: f64,

    /// Upper bound for pairs whose normalized names differ.
    /// Only identical names reach 1.0.
    pub near_identity_ceiling: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            phonetic_boost: 0.10,
            token_boost: 0.05,
            strong_token_ratio: 0.70,
            near_identity_ceiling: 0.99,
        }
    }
}

/// Match strength thresholds on the 0-100 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// EXACT at or above
    pub exact: f64,
    /// HIGH at or above
    pub high: f64,
    /// MEDIUM at or above
    pub medium: f64,
    /// LOW at or above
    pub low: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            exact: 100.0,
            high: 85.0,
            medium: 70.0,
            low: 50.0,
        }
    }
}

/// PEP risk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PepConfig {
    /// Months after leaving office before a PEP counts as former
    pub decay_threshold_months: u32,

    /// Relative reduction of the risk score for former PEPs (0.0 - 1.0)
    pub decay_factor: f64,

    /// Minimum risk score for the HIGH tier
    pub high_tier_min_score: f64,

    /// Minimum risk score for the MEDIUM tier. Anything lower is LOW.
    pub medium_tier_min_score: f64,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            decay_threshold_months: 12,
            decay_factor: 0.40,
            high_tier_min_score: 75.0,
            medium_tier_min_score: 45.0,
        }
    }
}

/// Screening orchestration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Timeout for every repository call (milliseconds)
    pub lookup_timeout_ms: u64,

    /// Maximum subjects screened concurrently by `screen_batch`
    pub max_concurrency: usize,

    /// Minimum name strength for a PEP registry hit to count
    pub min_pep_strength: MatchStrength,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 2_000,
            max_concurrency: 16,
            min_pep_strength: MatchStrength::Medium,
        }
    }
}

/// Rescreening scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum subjects rescreened concurrently by `execute_due`
    pub max_concurrency: usize,

    /// How long a claimed schedule stays owned by its executor (seconds)
    pub lease_seconds: u64,

    /// Per-call timeout for subject directory and schedule store calls (milliseconds)
    pub io_timeout_ms: u64,

    /// Backoff for failed rescreenings
    pub retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            lease_seconds: 900, // 15 minutes
            io_timeout_ms: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for failed rescreenings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive failures tolerated before manual attention
    pub max_retries: u32,

    /// Delay before the first retry (seconds)
    pub initial_delay_secs: u64,

    /// Upper bound for any retry delay (seconds)
    pub max_delay_secs: u64,

    /// Exponential growth factor
    pub backoff_multiplier: f64,

    /// Extra random delay as a fraction of the computed delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_secs: 300,  // 5 minutes
            max_delay_secs: 86_400,   // 1 day
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,       // 10% jitter
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ScreeningError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| ScreeningError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Some(v) = env_var("SCREENING_LOOKUP_TIMEOUT_MS")? {
            config.orchestrator.lookup_timeout_ms = v;
        }

        if let Some(v) = env_var("SCREENING_MAX_CONCURRENCY")? {
            config.orchestrator.max_concurrency = v;
        }

        if let Some(v) = env_var("SCREENING_PHONETIC_BOOST")? {
            config.scorer.phonetic_boost = v;
        }

        if let Some(v) = env_var("SCREENING_TOKEN_BOOST")? {
            config.scorer.token_boost = v;
        }

        if let Some(v) = env_var("SCREENING_RESCREEN_CONCURRENCY")? {
            config.scheduler.max_concurrency = v;
        }

        if let Some(v) = env_var("SCREENING_RESCREEN_IO_TIMEOUT_MS")? {
            config.scheduler.io_timeout_ms = v;
        }

        if let Some(v) = env_var("SCREENING_RESCREEN_MAX_RETRIES")? {
            config.scheduler.retry.max_retries = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(c.exact > c.high && c.high > c.medium && c.medium > c.low && c.low > 0.0) {
            return Err(ScreeningError::Config(format!(
                "Classifier thresholds must be strictly descending: exact={} high={} medium={} low={}",
                c.exact, c.high, c.medium, c.low
            )));
        }
        if c.exact > 100.0 {
            return Err(ScreeningError::Config(format!(
                "EXACT threshold {} exceeds 100",
                c.exact
            )));
        }

        let s = &self.scorer;
        for (name, value) in [
            ("phonetic_boost", s.phonetic_boost),
            ("token_boost", s.token_boost),
            ("strong_token_ratio", s.strong_token_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScreeningError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(0.0..1.0).contains(&s.near_identity_ceiling) {
            return Err(ScreeningError::Config(format!(
                "near_identity_ceiling must be within [0, 1), got {}",
                s.near_identity_ceiling
            )));
        }

        let p = &self.pep;
        if !(0.0..1.0).contains(&p.decay_factor) {
            return Err(ScreeningError::Config(format!(
                "PEP decay_factor must be within [0, 1), got {}",
                p.decay_factor
            )));
        }
        if p.high_tier_min_score <= p.medium_tier_min_score {
            return Err(ScreeningError::Config(
                "PEP HIGH tier score must exceed MEDIUM tier score".to_string(),
            ));
        }

        if self.orchestrator.max_concurrency == 0 || self.scheduler.max_concurrency == 0 {
            return Err(ScreeningError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.lookup_timeout_ms == 0 {
            return Err(ScreeningError::Config(
                "lookup_timeout_ms must be positive".to_string(),
            ));
        }
        if self.scheduler.lease_seconds == 0 || self.scheduler.lease_seconds > MAX_LEASE_SECS {
            return Err(ScreeningError::Config(format!(
                "lease_seconds must be within [1, {}], got {}",
                MAX_LEASE_SECS, self.scheduler.lease_seconds
            )));
        }
        if self.scheduler.io_timeout_ms == 0 {
            return Err(ScreeningError::Config(
                "io_timeout_ms must be positive".to_string(),
            ));
        }

        let r = &self.scheduler.retry;
        if !(r.backoff_multiplier >= 1.0 && r.backoff_multiplier.is_finite())
            || !(0.0..=1.0).contains(&r.jitter_factor)
            || r.initial_delay_secs == 0
        {
            return Err(ScreeningError::Config(format!(
                "Invalid retry policy: initial={}s multiplier={} jitter={}",
                r.initial_delay_secs, r.backoff_multiplier, r.jitter_factor
            )));
        }
        if r.max_delay_secs > MAX_RETRY_DELAY_SECS || r.initial_delay_secs > r.max_delay_secs {
            return Err(ScreeningError::Config(format!(
                "Retry delays must satisfy initial <= max <= {}s: initial={}s max={}s",
                MAX_RETRY_DELAY_SECS, r.initial_delay_secs, r.max_delay_secs
            )));
        }

        Ok(())
    }
}

// Longest claim lease: one week
const MAX_LEASE_SECS: u64 = 7 * 86_400;

// Longest retry delay: 30 days
const MAX_RETRY_DELAY_SECS: u64 = 30 * 86_400;

fn env_var<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ScreeningError::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.high, 85.0);
        assert_eq!(config.scorer.phonetic_boost, 0.10);
        assert_eq!(config.scorer.token_boost, 0.05);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [classifier]
            high = 90.0

            [orchestrator]
            lookup_timeout_ms = 750
            min_pep_strength = "HIGH"
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.high, 90.0);
        assert_eq!(config.classifier.medium, 70.0);
        assert_eq!(config.orchestrator.lookup_timeout_ms, 750);
        assert_eq!(config.orchestrator.min_pep_strength, MatchStrength::High);
        assert_eq!(config.scheduler.retry.max_retries, 5);
    }

    #[test]
    fn test_overlapping_thresholds_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
            [classifier]
            high = 60.0
            medium = 70.0
            "#,
        );
        assert!(matches!(result, Err(ScreeningError::Config(_))));
    }

    #[test]
    fn test_out_of_range_boost_rejected() {
        let mut config = EngineConfig::default();
        config.scorer.phonetic_boost = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unbounded_durations_rejected() {
        let mut config = EngineConfig::default();
        config.scheduler.lease_seconds = u64::MAX;
        assert!(matches!(config.validate(), Err(ScreeningError::Config(_))));

        let mut config = EngineConfig::default();
        config.scheduler.retry.max_delay_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(ScreeningError::Config(_))));

        let mut config = EngineConfig::default();
        config.scheduler.retry.jitter_factor = 5.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.scheduler.io_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("SCREENING_RESCREEN_MAX_RETRIES", "2");
        let config = EngineConfig::from_env().unwrap();
        std::env::remove_var("SCREENING_RESCREEN_MAX_RETRIES");
        assert_eq!(config.scheduler.retry.max_retries, 2);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
