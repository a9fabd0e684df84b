//! Politically exposed person risk derivation
//!
//! Risk is never stored on a profile. It is re-derived from the profile and an
//! explicit `as_of` date every time, so the same inputs always give the same
//! tier and EDD requirements.

use crate::config::PepConfig;
use crate::types::RiskTier;
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const HIGH_BASE_SCORE: f64 = 90.0;
const MEDIUM_BASE_SCORE: f64 = 60.0;
const LOW_BASE_SCORE: f64 = 30.0;

/// Classification of the public function held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionClass {
    /// Head of state or government
    HeadOfState,
    /// Minister, senior judge, central bank board, senior military
    SeniorOfficial,
    /// Mid-level official, state-owned enterprise management
    MidLevelOfficial,
    /// Honorary or ceremonial function
    Honorary,
    /// Family member or close associate of a PEP
    RelativeOrCloseAssociate,
}

impl PositionClass {
    /// Risk tier of the position while it is held
    pub fn base_tier(&self) -> RiskTier {
        match self {
            PositionClass::HeadOfState | PositionClass::SeniorOfficial => RiskTier::High,
            PositionClass::MidLevelOfficial | PositionClass::RelativeOrCloseAssociate => {
                RiskTier::Medium
            }
            PositionClass::Honorary => RiskTier::Low,
        }
    }
}

/// PEP registry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepProfile {
    /// Registry identifier
    pub pep_id: String,
    /// Full name
    pub name: String,
    /// Known aliases and transliterations
    pub aliases: Vec<String>,
    /// Position title as published
    pub position_title: String,
    /// Position classification
    pub position_class: PositionClass,
    /// ISO 3166 alpha-2 country of the position
    pub country: String,
    /// Ministry, parliament, state enterprise
    pub organization: Option<String>,
    /// Position start date
    pub start_date: Option<NaiveDate>,
    /// Position end date, `None` while in office
    pub end_date: Option<NaiveDate>,
    /// Registry ids of relatives and close associates
    pub related_person_ids: Vec<String>,
    /// Relationship to the linked PEP (RCA records only)
    pub relationship: Option<String>,
}

impl PepProfile {
    /// Create a profile for a position currently held
    pub fn new(
        pep_id: impl Into<String>,
        name: impl Into<String>,
        position_title: impl Into<String>,
        position_class: PositionClass,
        country: impl Into<String>,
    ) -> Self {
        Self {
            pep_id: pep_id.into(),
            name: name.into(),
            aliases: Vec::new(),
            position_title: position_title.into(),
            position_class,
            country: country.into(),
            organization: None,
            start_date: None,
            end_date: None,
            related_person_ids: Vec::new(),
            relationship: None,
        }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set organization
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set tenure
    pub fn with_tenure(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Link a relative or close associate
    pub fn with_related_person(mut self, pep_id: impl Into<String>) -> Self {
        self.related_person_ids.push(pep_id.into());
        self
    }

    /// Set relationship to the linked PEP
    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }
}

/// Tenure status relative to an as-of date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PepStatus {
    /// In office (no end date, or end date not yet reached)
    Active,
    /// Left office within the decay threshold
    RecentlyDeparted,
    /// Left office longer ago than the decay threshold
    Former,
}

/// Enhanced due diligence obligations, fixed per risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EddRequirements {
    /// Senior management must approve the relationship
    pub senior_management_approval: bool,
    /// Source of wealth must be verified
    pub source_of_wealth_verification: bool,
    /// Ongoing monitoring interval
    pub monitoring_frequency_days: u32,
}

impl EddRequirements {
    /// Lookup for a tier
    pub fn for_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::High => Self {
                senior_management_approval: true,
                source_of_wealth_verification: true,
                monitoring_frequency_days: 30,
            },
            RiskTier::Medium => Self {
                senior_management_approval: true,
                source_of_wealth_verification: false,
                monitoring_frequency_days: 90,
            },
            RiskTier::Low | RiskTier::None => Self {
                senior_management_approval: false,
                source_of_wealth_verification: false,
                monitoring_frequency_days: 365,
            },
        }
    }
}

/// Risk derived for one profile at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepAssessment {
    /// Tenure status
    pub status: PepStatus,
    /// Risk score (0-100) after decay
    pub risk_score: f64,
    /// Resulting tier, never below LOW
    pub risk_tier: RiskTier,
    /// Due diligence obligations for the tier
    pub edd: EddRequirements,
    /// Date the assessment was derived for
    pub as_of: DateTime<Utc>,
}

/// Derives PEP risk tier and EDD requirements
#[derive(Debug, Clone)]
pub struct PepRiskAssessor {
    config: PepConfig,
}

impl PepRiskAssessor {
    /// Create assessor from configuration
    pub fn new(config: PepConfig) -> Self {
        Self { config }
    }

    /// Tenure status of a profile at `as_of`
    pub fn status(&self, profile: &PepProfile, as_of: DateTime<Utc>) -> PepStatus {
        let today = as_of.date_naive();
        match profile.end_date {
            None => PepStatus::Active,
            Some(end) if end >= today => PepStatus::Active,
            Some(end) => {
                let cutoff = today
                    .checked_sub_months(Months::new(self.config.decay_threshold_months))
                    .unwrap_or(NaiveDate::MIN);
                if end < cutoff {
                    PepStatus::Former
                } else {
                    PepStatus::RecentlyDeparted
                }
            }
        }
    }

    /// Assess a profile. Pure given `as_of`.
    pub fn assess(&self, profile: &PepProfile, as_of: DateTime<Utc>) -> PepAssessment {
        let status = self.status(profile, as_of);

        let base = match profile.position_class.base_tier() {
            RiskTier::High => HIGH_BASE_SCORE,
            RiskTier::Medium => MEDIUM_BASE_SCORE,
            RiskTier::Low | RiskTier::None => LOW_BASE_SCORE,
        };
        let raw = match status {
            PepStatus::Former => base * (1.0 - self.config.decay_factor),
            PepStatus::Active | PepStatus::RecentlyDeparted => base,
        };
        let risk_score = (raw * 100.0).round() / 100.0;
        let risk_tier = self.tier_for_score(risk_score);

        PepAssessment {
            status,
            risk_score,
            risk_tier,
            edd: EddRequirements::for_tier(risk_tier),
            as_of,
        }
    }

    // PEP exposure never fully expires: LOW is the floor
    fn tier_for_score(&self, score: f64) -> RiskTier {
        if score >= self.config.high_tier_min_score {
            RiskTier::High
        } else if score >= self.config.medium_tier_min_score {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl Default for PepRiskAssessor {
    fn default() -> Self {
        Self::new(PepConfig::default())
    }
}
