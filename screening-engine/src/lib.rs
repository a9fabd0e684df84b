//! Sanctions and PEP screening engine
//!
//! Screens individuals and organizations against sanctions watchlists
//! (OFAC, EU, UN, UK HMT, local lists) and politically exposed person
//! registries, and keeps every subject on a periodic rescreening schedule.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        RescreeningScheduler (execute_due)            │
//! │   ScheduleStore (CAS) · RetryStrategy · lease        │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ screen(subject)
//! ┌────────────────────────▼─────────────────────────────┐
//! │        ScreeningOrchestrator (screen / batch)        │
//! └───┬──────────────┬──────────────┬────────────────┬───┘
//!     │              │              │                │
//! ┌───▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐ ┌───────▼──────┐
//! │Normalizer│ │ Similarity │ │ Classifier │ │ PEP assessor │
//! └──────────┘ └────────────┘ └────────────┘ └──────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │      WatchlistRepository (external, read-only)       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - Similarity is in `[0, 1]` and reaches 1 only for identical normalized names
//! - Match strength is a pure function of score
//! - `requires_blocking` iff some sanctions match is EXACT
//! - Time is always passed in (`as_of`); nothing reads the wall clock for decisions
//! - A schedule is advanced at most once per due cycle

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod pep;
pub mod repository;
pub mod scheduler;
pub mod similarity;
pub mod types;

pub use classifier::{MatchClassifier, MatchStrength, RecommendedAction};
pub use config::EngineConfig;
pub use error::{Result, ScreeningError};
pub use events::{EventSink, InMemoryEventSink, ScreeningEvent, TracingEventSink};
pub use metrics::ScreeningMetrics;
pub use normalizer::{NameNormalizer, NormalizedName};
pub use orchestrator::{ListUnavailablePolicy, ScreeningOptions, ScreeningOrchestrator};
pub use pep::{EddRequirements, PepAssessment, PepProfile, PepRiskAssessor, PepStatus, PositionClass};
pub use repository::{
    InMemorySubjectDirectory, InMemoryWatchlistRepository, SubjectDirectory, WatchlistRepository,
};
pub use scheduler::{
    BatchExecutionSummary, FrequencyTier, InMemoryScheduleStore, RescreeningScheduler,
    ScheduleOptions, ScheduleStore, ScreeningSchedule, UnitOutcome,
};
pub use similarity::{Score, SimilarityScorer};
pub use types::{
    Disposition, EntityType, ListSource, RiskTier, SanctionsMatch, ScreeningResult,
    ScreeningSubject, SubjectId, WatchlistCandidate,
};
