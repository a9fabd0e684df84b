//! Core screening types

use crate::classifier::{MatchStrength, RecommendedAction};
use crate::error::{Result, ScreeningError};
use crate::pep::{PepAssessment, PepProfile};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identifier of a screened subject (customer, counterparty, beneficial owner)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create new subject ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of party being screened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Natural person
    Individual,
    /// Company, bank, NGO, state body
    Organization,
}

/// Watchlist source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListSource {
    /// US Office of Foreign Assets Control
    Ofac,
    /// European Union consolidated list
    Eu,
    /// United Nations Security Council
    Un,
    /// UK HM Treasury
    UkHmt,
    /// Country-specific or internal list
    Local(String),
}

impl ListSource {
    /// Canonical list code
    pub fn as_str(&self) -> &str {
        match self {
            ListSource::Ofac => "OFAC",
            ListSource::Eu => "EU",
            ListSource::Un => "UN",
            ListSource::UkHmt => "UK_HMT",
            ListSource::Local(name) => name,
        }
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity being screened. Constructed per screening call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSubject {
    /// Subject identifier
    pub id: SubjectId,
    /// Full legal name
    pub full_name: String,
    /// Individual or organization
    pub entity_type: EntityType,
    /// Date of birth (individuals) or incorporation
    pub date_of_birth: Option<NaiveDate>,
    /// ISO 3166 alpha-2 nationality / country of registration
    pub nationality: Option<String>,
    /// Known aliases and former names
    pub aliases: Vec<String>,
    /// Passport, national ID, registration numbers
    pub document_numbers: Vec<String>,
}

impl ScreeningSubject {
    /// Create a subject with only the required fields
    pub fn new(id: impl Into<SubjectId>, full_name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            entity_type,
            date_of_birth: None,
            nationality: None,
            aliases: Vec::new(),
            document_numbers: Vec::new(),
        }
    }

    /// Set date of birth
    pub fn with_date_of_birth(mut self, dob: NaiveDate) -> Self {
        self.date_of_birth = Some(dob);
        self
    }

    /// Set nationality
    pub fn with_nationality(mut self, country: impl Into<String>) -> Self {
        self.nationality = Some(country.into());
        self
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add an identification document number
    pub fn with_document(mut self, number: impl Into<String>) -> Self {
        self.document_numbers.push(number.into());
        self
    }

    /// Check required identity fields
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(ScreeningError::InvalidSubject(
                "subject id is empty".to_string(),
            ));
        }
        if self.full_name.trim().is_empty() {
            return Err(ScreeningError::InvalidSubject(format!(
                "subject {} has no name",
                self.id
            )));
        }
        Ok(())
    }
}

/// Watchlist entry returned by the repository. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistCandidate {
    /// Entry identifier within its list
    pub entry_id: String,
    /// List the entry belongs to
    pub list_source: ListSource,
    /// Primary listed name
    pub name: String,
    /// Listed aliases (a.k.a., f.k.a.)
    pub aliases: Vec<String>,
    /// Listed date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// Listed nationality
    pub nationality: Option<String>,
    /// Listed identification numbers
    pub document_numbers: Vec<String>,
    /// Sanctions programs (e.g. SDGT, IRAN)
    pub programs: Vec<String>,
    /// Free-form remarks
    pub remarks: Option<String>,
}

impl WatchlistCandidate {
    /// Create a candidate with only the required fields
    pub fn new(entry_id: impl Into<String>, list_source: ListSource, name: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            list_source,
            name: name.into(),
            aliases: Vec::new(),
            date_of_birth: None,
            nationality: None,
            document_numbers: Vec::new(),
            programs: Vec::new(),
            remarks: None,
        }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set date of birth
    pub fn with_date_of_birth(mut self, dob: NaiveDate) -> Self {
        self.date_of_birth = Some(dob);
        self
    }

    /// Add an identification document number
    pub fn with_document(mut self, number: impl Into<String>) -> Self {
        self.document_numbers.push(number.into());
        self
    }

    /// Add a sanctions program
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.programs.push(program.into());
        self
    }
}

/// Agreement on fields other than the name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorroborationFlags {
    /// Dates of birth are equal
    pub dob_match: bool,
    /// At least one identification number is shared
    pub document_match: bool,
}

impl CorroborationFlags {
    /// Any corroborating field agrees
    pub fn any(&self) -> bool {
        self.dob_match || self.document_match
    }
}

/// Which candidate name produced the best score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    /// Listed primary name
    PrimaryName,
    /// One of the listed aliases
    Alias,
}

/// One scored pairing of a subject against one watchlist entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsMatch {
    /// List the entry belongs to
    pub list_source: ListSource,
    /// Entry identifier within its list
    pub entry_id: String,
    /// Listed name (or alias) that matched
    pub matched_name: String,
    /// Whether the primary name or an alias matched
    pub matched_field: MatchedField,
    /// Similarity on the 0-100 presentation scale
    pub score: f64,
    /// Classified match strength
    pub strength: MatchStrength,
    /// Corroborating fields, left for downstream policy
    pub corroboration: CorroborationFlags,
    /// Sanctions programs of the entry
    pub programs: Vec<String>,
    /// When the match was produced
    pub matched_at: DateTime<Utc>,
}

impl SanctionsMatch {
    /// Action recommended for this match strength
    pub fn recommended_action(&self) -> RecommendedAction {
        self.strength.recommended_action()
    }
}

/// Overall risk tier, totally ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// No risk indicators
    None,
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::None => "NONE",
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// Recommended disposition of a screening call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// No blocking or review condition
    Clear,
    /// Compliance review required
    Review,
    /// Block the transaction / onboarding
    Block,
}

impl Disposition {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Clear => "clear",
            Disposition::Review => "review",
            Disposition::Block => "block",
        }
    }
}

/// A PEP registry hit with its derived risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepMatch {
    /// Matched PEP record
    pub profile: PepProfile,
    /// Name similarity on the 0-100 scale
    pub name_score: f64,
    /// Classified name match strength
    pub strength: MatchStrength,
    /// Risk derived for the screening `as_of`
    pub assessment: PepAssessment,
    /// Relatives and close associates of the PEP
    pub related_persons: Vec<PepProfile>,
}

/// Aggregate of a single screening call. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    /// Screening identifier
    pub screening_id: Uuid,
    /// Screened subject
    pub subject_id: SubjectId,
    /// Sanctions hits (strength above NONE)
    pub sanctions_matches: Vec<SanctionsMatch>,
    /// PEP hits
    pub pep_matches: Vec<PepMatch>,
    /// Maximum risk across all matches
    pub overall_risk: RiskTier,
    /// At least one EXACT sanctions match
    pub requires_blocking: bool,
    /// HIGH/MEDIUM match, unmet EDD on a HIGH PEP, or partial results
    pub requires_review: bool,
    /// Resulting disposition
    pub disposition: Disposition,
    /// Lists skipped because they were unreachable
    pub unavailable_lists: Vec<ListSource>,
    /// Screening timestamp (the caller's as-of)
    pub screened_at: DateTime<Utc>,
    /// Wall time spent screening
    pub elapsed: Duration,
}

impl ScreeningResult {
    /// Highest sanctions match strength, NONE when nothing matched
    pub fn max_strength(&self) -> MatchStrength {
        self.sanctions_matches
            .iter()
            .map(|m| m.strength)
            .max()
            .unwrap_or(MatchStrength::None)
    }

    /// Whether the outcome allows the transaction to proceed
    pub fn is_clear(&self) -> bool {
        self.disposition == Disposition::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_validation() {
        let subject = ScreeningSubject::new("S-1", "Jane Smith", EntityType::Individual);
        assert!(subject.validate().is_ok());

        let blank = ScreeningSubject::new("S-2", "   ", EntityType::Individual);
        assert!(matches!(
            blank.validate(),
            Err(ScreeningError::InvalidSubject(_))
        ));

        let no_id = ScreeningSubject::new("", "Jane Smith", EntityType::Individual);
        assert!(no_id.validate().is_err());
    }

    #[test]
    fn test_risk_tier_ordering() {
        assert!(RiskTier::None < RiskTier::Low);
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert_eq!(
            [RiskTier::Low, RiskTier::High, RiskTier::None].iter().max(),
            Some(&RiskTier::High)
        );
    }

    #[test]
    fn test_list_source_codes() {
        assert_eq!(ListSource::Ofac.as_str(), "OFAC");
        assert_eq!(ListSource::UkHmt.to_string(), "UK_HMT");
        assert_eq!(ListSource::Local("AE_LOCAL".into()).as_str(), "AE_LOCAL");
    }

    #[test]
    fn test_subject_id_serializes_transparently() {
        let id = SubjectId::new("CUST-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CUST-42\"");
    }
}
