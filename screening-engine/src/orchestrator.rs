//! Screening orchestration
//!
//! One `screen` call normalizes the subject, queries every requested list,
//! scores and classifies each candidate, runs PEP screening, and folds
//! everything into a single immutable [`ScreeningResult`].
//!
//! Every repository call carries its own timeout. A timeout is a transient
//! failure for the caller (or the scheduler) to retry; nothing here retries.

use crate::classifier::{corroborate, MatchClassifier, MatchStrength};
use crate::config::{EngineConfig, OrchestratorConfig};
use crate::error::{Result, ScreeningError};
use crate::events::{EventEnvelope, EventSink, ScreeningEvent, TracingEventSink};
use crate::metrics::ScreeningMetrics;
use crate::normalizer::{NameNormalizer, NormalizedName};
use crate::pep::{PepProfile, PepRiskAssessor};
use crate::repository::WatchlistRepository;
use crate::similarity::SimilarityScorer;
use crate::types::{
    Disposition, EntityType, ListSource, MatchedField, PepMatch, RiskTier, SanctionsMatch,
    ScreeningResult, ScreeningSubject, SubjectId, WatchlistCandidate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What to do when a requested list cannot be reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListUnavailablePolicy {
    /// Return `ListUnavailable` to the caller
    #[default]
    Fail,
    /// Screen the remaining lists and force a review disposition
    SkipAndReview,
}

/// Per-call screening options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningOptions {
    /// Point in time for every time-dependent derivation
    pub as_of: DateTime<Utc>,
    /// Screen against the PEP registry
    pub include_pep: bool,
    /// Fetch relatives and close associates of PEP hits
    pub include_related_persons: bool,
    /// Score subject and candidate aliases as well as primary names
    pub include_aliases: bool,
    /// PEP ids whose enhanced due diligence is already on file
    pub edd_satisfied_for: HashSet<String>,
    /// Behaviour when a list is down
    pub on_list_unavailable: ListUnavailablePolicy,
}

impl ScreeningOptions {
    /// Full screening as of the given instant
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            include_pep: true,
            include_related_persons: true,
            include_aliases: true,
            edd_satisfied_for: HashSet::new(),
            on_list_unavailable: ListUnavailablePolicy::Fail,
        }
    }

    /// Sanctions lists only
    pub fn without_pep(mut self) -> Self {
        self.include_pep = false;
        self
    }

    /// Skip relatives and close associates
    pub fn without_related_persons(mut self) -> Self {
        self.include_related_persons = false;
        self
    }

    /// Compare primary names only
    pub fn without_aliases(mut self) -> Self {
        self.include_aliases = false;
        self
    }

    /// Record completed EDD for a PEP
    pub fn with_edd_satisfied(mut self, pep_id: impl Into<String>) -> Self {
        self.edd_satisfied_for.insert(pep_id.into());
        self
    }

    /// Set the unavailable-list policy
    pub fn with_list_unavailable_policy(mut self, policy: ListUnavailablePolicy) -> Self {
        self.on_list_unavailable = policy;
        self
    }
}

/// Screens subjects against watchlists and the PEP registry
pub struct ScreeningOrchestrator {
    normalizer: NameNormalizer,
    scorer: SimilarityScorer,
    classifier: MatchClassifier,
    pep_assessor: PepRiskAssessor,
    repository: Arc<dyn WatchlistRepository>,
    config: OrchestratorConfig,
    prefilter_hint: f64,
    events: Arc<dyn EventSink>,
    metrics: Arc<ScreeningMetrics>,
}

impl ScreeningOrchestrator {
    /// Create an orchestrator over a repository
    pub fn new(config: &EngineConfig, repository: Arc<dyn WatchlistRepository>) -> Result<Self> {
        config.validate()?;

        // Loosest score a boosted pair could need to still reach LOW
        let prefilter_hint = (config.classifier.low / 100.0
            - config.scorer.phonetic_boost
            - config.scorer.token_boost)
            .max(0.0);

        Ok(Self {
            normalizer: NameNormalizer::new(&config.normalizer),
            scorer: SimilarityScorer::new(config.scorer.clone()),
            classifier: MatchClassifier::new(config.classifier.clone()),
            pep_assessor: PepRiskAssessor::new(config.pep.clone()),
            repository,
            config: config.orchestrator.clone(),
            prefilter_hint,
            events: Arc::new(TracingEventSink),
            metrics: Arc::new(ScreeningMetrics::new()?),
        })
    }

    /// Deliver events to `sink` instead of the log
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Share a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<ScreeningMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Arc<ScreeningMetrics> {
        &self.metrics
    }

    /// Similarity hint passed to the repository
    pub fn prefilter_hint(&self) -> f64 {
        self.prefilter_hint
    }

    /// Screen one subject. All errors propagate.
    #[instrument(skip(self, subject, lists, options), fields(subject_id = %subject.id))]
    pub async fn screen(
        &self,
        subject: &ScreeningSubject,
        lists: &[ListSource],
        options: &ScreeningOptions,
    ) -> Result<ScreeningResult> {
        self.metrics.screening_requests_total.inc();
        let started = Instant::now();

        match self.screen_subject(subject, lists, options, started).await {
            Ok(result) => {
                self.record(&result);
                Ok(result)
            }
            Err(e) => {
                self.metrics.screening_errors_total.inc();
                warn!("Screening failed for {}: {}", subject.id, e);
                Err(e)
            }
        }
    }

    /// Screen many subjects concurrently. Each subject's outcome is independent:
    /// one failure never affects the others. Duplicate ids are screened once.
    #[instrument(skip_all, fields(batch_size = subjects.len()))]
    pub async fn screen_batch(
        self: &Arc<Self>,
        subjects: Vec<ScreeningSubject>,
        lists: &[ListSource],
        options: &ScreeningOptions,
    ) -> HashMap<SubjectId, Result<ScreeningResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let lists: Arc<[ListSource]> = Arc::from(lists);
        let options = Arc::new(options.clone());

        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(subjects.len());
        let mut results = HashMap::with_capacity(subjects.len());

        for subject in subjects {
            if !seen.insert(subject.id.clone()) {
                debug!("Skipping duplicate subject {} in batch", subject.id);
                continue;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    results.insert(
                        subject.id.clone(),
                        Err(ScreeningError::Internal(format!("worker pool closed: {}", e))),
                    );
                    continue;
                }
            };

            let orchestrator = Arc::clone(self);
            let lists = Arc::clone(&lists);
            let options = Arc::clone(&options);
            let subject_id = subject.id.clone();

            let handle = tokio::spawn(async move {
                let result = orchestrator.screen(&subject, &lists, &options).await;
                drop(permit);
                result
            });
            handles.push((subject_id, handle));
        }

        for (subject_id, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Screening task for {} aborted: {}", subject_id, e);
                    Err(ScreeningError::Internal(format!("screening task failed: {}", e)))
                }
            };
            results.insert(subject_id, outcome);
        }

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(
            "Batch screening finished: {} subjects, {} failed",
            results.len(),
            failed
        );
        results
    }

    async fn screen_subject(
        &self,
        subject: &ScreeningSubject,
        lists: &[ListSource],
        options: &ScreeningOptions,
        started: Instant,
    ) -> Result<ScreeningResult> {
        subject.validate()?;

        let subject_names = self.subject_names(subject, options);
        if subject_names.is_empty() {
            return Err(ScreeningError::InvalidSubject(format!(
                "name of subject {} has no usable tokens",
                subject.id
            )));
        }

        let mut sanctions_matches = Vec::new();
        let mut unavailable_lists = Vec::new();

        let requested: BTreeSet<&ListSource> = lists.iter().collect();
        for list_source in requested {
            match self.screen_list(subject, &subject_names, list_source, options).await {
                Ok(mut matches) => sanctions_matches.append(&mut matches),
                Err(ScreeningError::ListUnavailable(list))
                    if options.on_list_unavailable == ListUnavailablePolicy::SkipAndReview =>
                {
                    warn!("Skipping unavailable list {} for {}", list, subject.id);
                    unavailable_lists.push(list);
                }
                Err(e) => return Err(e),
            }
        }

        sanctions_matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.list_source.cmp(&b.list_source))
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });

        // PEP exposure applies to natural persons only
        let pep_matches = if options.include_pep && subject.entity_type == EntityType::Individual {
            self.screen_pep(&subject_names, options).await?
        } else {
            Vec::new()
        };

        Ok(self.aggregate(
            subject,
            sanctions_matches,
            pep_matches,
            unavailable_lists,
            options,
            started.elapsed(),
        ))
    }

    fn subject_names(&self, subject: &ScreeningSubject, options: &ScreeningOptions) -> Vec<NormalizedName> {
        let mut names = Vec::new();
        let primary = self
            .normalizer
            .normalize_entity(&subject.full_name, subject.entity_type);
        if !primary.is_empty() {
            names.push(primary);
        } else {
            return names;
        }

        if options.include_aliases {
            for alias in &subject.aliases {
                let alias = self.normalizer.normalize_entity(alias, subject.entity_type);
                if !alias.is_empty() && !names.contains(&alias) {
                    names.push(alias);
                }
            }
        }
        names
    }

    async fn screen_list(
        &self,
        subject: &ScreeningSubject,
        subject_names: &[NormalizedName],
        list_source: &ListSource,
        options: &ScreeningOptions,
    ) -> Result<Vec<SanctionsMatch>> {
        let available = self
            .call("is_list_available", self.repository.is_list_available(list_source))
            .await?;
        if !available {
            return Err(ScreeningError::ListUnavailable(list_source.clone()));
        }

        // Merge lookups for every spelling of the subject, keyed by entry
        let mut candidates: BTreeMap<String, WatchlistCandidate> = BTreeMap::new();
        for name in subject_names {
            let found = self
                .call(
                    "find_candidates",
                    self.repository
                        .find_candidates(name, list_source, self.prefilter_hint),
                )
                .await?;
            for candidate in found {
                candidates.entry(candidate.entry_id.clone()).or_insert(candidate);
            }
        }

        let mut matches = Vec::new();
        for candidate in candidates.values() {
            if let Some(m) = self.score_candidate(subject, subject_names, candidate, options) {
                debug!(
                    "Sanctions match in {}: {} ~ {} ({}, {})",
                    list_source, subject.full_name, m.matched_name, m.score, m.strength
                );
                matches.push(m);
            }
        }
        Ok(matches)
    }

    fn score_candidate(
        &self,
        subject: &ScreeningSubject,
        subject_names: &[NormalizedName],
        candidate: &WatchlistCandidate,
        options: &ScreeningOptions,
    ) -> Option<SanctionsMatch> {
        let mut raw_names = vec![candidate.name.as_str()];
        if options.include_aliases {
            raw_names.extend(candidate.aliases.iter().map(String::as_str));
        }
        let candidate_names: Vec<NormalizedName> = raw_names
            .iter()
            .map(|n| self.normalizer.normalize_entity(n, subject.entity_type))
            .collect();

        let best = self.scorer.best_of(subject_names, &candidate_names)?;
        let matched_field = if best.right == 0 {
            MatchedField::PrimaryName
        } else {
            MatchedField::Alias
        };

        self.classifier.build_match(
            candidate,
            matched_field,
            raw_names[best.right],
            best.breakdown.score,
            corroborate(subject, candidate),
            options.as_of,
        )
    }

    async fn screen_pep(
        &self,
        subject_names: &[NormalizedName],
        options: &ScreeningOptions,
    ) -> Result<Vec<PepMatch>> {
        let mut profiles: BTreeMap<String, PepProfile> = BTreeMap::new();
        for name in subject_names {
            let found = self
                .call(
                    "find_pep_candidates",
                    self.repository.find_pep_candidates(name, self.prefilter_hint),
                )
                .await?;
            for profile in found {
                profiles.entry(profile.pep_id.clone()).or_insert(profile);
            }
        }

        let mut matches = Vec::new();
        for profile in profiles.into_values() {
            let mut names = vec![self.normalizer.normalize(&profile.name)];
            if options.include_aliases {
                names.extend(profile.aliases.iter().map(|a| self.normalizer.normalize(a)));
            }

            let Some(best) = self.scorer.best_of(subject_names, &names) else {
                continue;
            };
            let strength = self.classifier.classify(best.breakdown.score);
            if strength == MatchStrength::None || strength < self.config.min_pep_strength {
                continue;
            }

            let related_persons = if options.include_related_persons {
                self.call(
                    "get_related_persons",
                    self.repository.get_related_persons(&profile.pep_id),
                )
                .await?
            } else {
                Vec::new()
            };

            let assessment = self.pep_assessor.assess(&profile, options.as_of);
            debug!(
                "PEP match {} ({}): {:?}, tier {}",
                profile.pep_id, profile.position_title, assessment.status, assessment.risk_tier
            );

            matches.push(PepMatch {
                profile,
                name_score: best.breakdown.score.as_percent(),
                strength,
                assessment,
                related_persons,
            });
        }

        matches.sort_by(|a, b| b.name_score.total_cmp(&a.name_score));
        Ok(matches)
    }

    fn aggregate(
        &self,
        subject: &ScreeningSubject,
        sanctions_matches: Vec<SanctionsMatch>,
        pep_matches: Vec<PepMatch>,
        unavailable_lists: Vec<ListSource>,
        options: &ScreeningOptions,
        elapsed: Duration,
    ) -> ScreeningResult {
        let overall_risk = sanctions_matches
            .iter()
            .map(|m| m.strength.risk_tier())
            .chain(pep_matches.iter().map(|p| p.assessment.risk_tier))
            .max()
            .unwrap_or(RiskTier::None);

        let requires_blocking = sanctions_matches
            .iter()
            .any(|m| m.strength == MatchStrength::Exact);

        let strong_match = sanctions_matches
            .iter()
            .any(|m| matches!(m.strength, MatchStrength::High | MatchStrength::Medium));
        let edd_outstanding = pep_matches.iter().any(|p| {
            p.assessment.risk_tier == RiskTier::High
                && !options.edd_satisfied_for.contains(&p.profile.pep_id)
        });
        let requires_review = strong_match || edd_outstanding || !unavailable_lists.is_empty();

        let disposition = if requires_blocking {
            Disposition::Block
        } else if requires_review {
            Disposition::Review
        } else {
            Disposition::Clear
        };

        ScreeningResult {
            screening_id: Uuid::new_v4(),
            subject_id: subject.id.clone(),
            sanctions_matches,
            pep_matches,
            overall_risk,
            requires_blocking,
            requires_review,
            disposition,
            unavailable_lists,
            screened_at: options.as_of,
            elapsed,
        }
    }

    fn record(&self, result: &ScreeningResult) {
        for m in &result.sanctions_matches {
            self.metrics.record_match(m.strength);
            if m.strength >= MatchStrength::High {
                self.events.publish(EventEnvelope::new(ScreeningEvent::MatchAboveThreshold {
                    screening_id: result.screening_id,
                    subject_id: result.subject_id.clone(),
                    list_source: m.list_source.clone(),
                    entry_id: m.entry_id.clone(),
                    strength: m.strength,
                    score: m.score,
                }));
            }
        }
        self.metrics.record_result(result.disposition, result.elapsed);

        self.events.publish(EventEnvelope::new(ScreeningEvent::SubjectScreened {
            screening_id: result.screening_id,
            subject_id: result.subject_id.clone(),
            disposition: result.disposition,
            overall_risk: result.overall_risk,
            sanctions_matches: result.sanctions_matches.len(),
            pep_matches: result.pep_matches.len(),
        }));

        match result.disposition {
            Disposition::Block => warn!(
                "Screening BLOCK for {} (risk: {}, id: {})",
                result.subject_id, result.overall_risk, result.screening_id
            ),
            Disposition::Review => warn!(
                "Screening REVIEW for {} (risk: {}, id: {})",
                result.subject_id, result.overall_risk, result.screening_id
            ),
            Disposition::Clear => info!(
                "Screening CLEAR for {} (id: {})",
                result.subject_id, result.screening_id
            ),
        }
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = Duration::from_millis(self.config.lookup_timeout_ms);
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ScreeningError::RepositoryTimeout {
                operation: operation.to_string(),
                timeout_ms: self.config.lookup_timeout_ms,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventSink;
    use crate::pep::PositionClass;
    use crate::repository::InMemoryWatchlistRepository;
    use chrono::{NaiveDate, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
    }

    fn repository() -> Arc<InMemoryWatchlistRepository> {
        let repo = InMemoryWatchlistRepository::new();
        repo.load_list(
            ListSource::Ofac,
            vec![
                WatchlistCandidate::new("OFAC-001", ListSource::Ofac, "John Doe")
                    .with_alias("Johnathan Doe")
                    .with_program("SDGT"),
                WatchlistCandidate::new("OFAC-002", ListSource::Ofac, "Mohammed Al Rahman")
                    .with_date_of_birth(NaiveDate::from_ymd_opt(1970, 3, 2).unwrap()),
            ],
        );
        repo.load_list(
            ListSource::Un,
            vec![WatchlistCandidate::new("UN-001", ListSource::Un, "Peter Johnson")],
        );
        repo.add_pep(
            PepProfile::new(
                "PEP-1",
                "Elena Vasquez",
                "Minister of Interior",
                PositionClass::SeniorOfficial,
                "XX",
            )
            .with_related_person("PEP-2"),
        );
        repo.add_pep(
            PepProfile::new("PEP-2", "Marco Vasquez", "Spouse", PositionClass::RelativeOrCloseAssociate, "XX")
                .with_relationship("spouse"),
        );
        Arc::new(repo)
    }

    fn orchestrator(repo: Arc<InMemoryWatchlistRepository>) -> ScreeningOrchestrator {
        ScreeningOrchestrator::new(&EngineConfig::default(), repo).unwrap()
    }

    fn all_lists() -> Vec<ListSource> {
        vec![ListSource::Ofac, ListSource::Un]
    }

    #[tokio::test]
    async fn test_exact_match_blocks() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-1", "John Doe", EntityType::Individual);

        let result = orchestrator
            .screen(&subject, &all_lists(), &ScreeningOptions::new(as_of()))
            .await
            .unwrap();

        assert!(result.requires_blocking);
        assert_eq!(result.disposition, Disposition::Block);
        assert_eq!(result.overall_risk, RiskTier::High);
        assert_eq!(result.sanctions_matches[0].entry_id, "OFAC-001");
        assert_eq!(result.sanctions_matches[0].strength, MatchStrength::Exact);
        assert_eq!(result.sanctions_matches[0].programs, vec!["SDGT".to_string()]);
        assert_eq!(result.screened_at, as_of());
    }

    #[tokio::test]
    async fn test_transliteration_variant_is_high() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-2", "Mohammad Al-Rahman", EntityType::Individual)
            .with_date_of_birth(NaiveDate::from_ymd_opt(1970, 3, 2).unwrap());

        let result = orchestrator
            .screen(&subject, &[ListSource::Ofac], &ScreeningOptions::new(as_of()))
            .await
            .unwrap();

        let m = result
            .sanctions_matches
            .iter()
            .find(|m| m.entry_id == "OFAC-002")
            .unwrap();
        assert_eq!(m.strength, MatchStrength::High);
        assert!(m.corroboration.dob_match);
        assert!(!result.requires_blocking);
        assert!(result.requires_review);
        assert_eq!(result.disposition, Disposition::Review);
    }

    #[tokio::test]
    async fn test_alias_match_reports_field() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-3", "Johnathan Doe", EntityType::Individual);

        let result = orchestrator
            .screen(&subject, &[ListSource::Ofac], &ScreeningOptions::new(as_of()))
            .await
            .unwrap();

        let m = &result.sanctions_matches[0];
        assert_eq!(m.entry_id, "OFAC-001");
        assert_eq!(m.matched_field, MatchedField::Alias);
        assert_eq!(m.matched_name, "Johnathan Doe");
        assert_eq!(m.strength, MatchStrength::Exact);
    }

    #[tokio::test]
    async fn test_unrelated_name_is_clear() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-4", "John Smith", EntityType::Individual);

        let result = orchestrator
            .screen(&subject, &[ListSource::Un], &ScreeningOptions::new(as_of()))
            .await
            .unwrap();

        assert!(result.sanctions_matches.is_empty());
        assert!(result.is_clear());
        assert_eq!(result.overall_risk, RiskTier::None);
    }

    #[tokio::test]
    async fn test_invalid_subject_rejected() {
        let orchestrator = orchestrator(repository());
        let options = ScreeningOptions::new(as_of());

        let blank = ScreeningSubject::new("S-5", "  ", EntityType::Individual);
        let result = orchestrator.screen(&blank, &all_lists(), &options).await;
        assert!(matches!(result, Err(ScreeningError::InvalidSubject(_))));

        let only_title = ScreeningSubject::new("S-6", "Dr.", EntityType::Individual);
        let result = orchestrator.screen(&only_title, &all_lists(), &options).await;
        assert!(matches!(result, Err(ScreeningError::InvalidSubject(_))));
        assert_eq!(orchestrator.metrics().screening_errors_total.get(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_list_policies() {
        let repo = repository();
        repo.set_list_available(&ListSource::Un, false);
        let orchestrator = orchestrator(repo);
        let subject = ScreeningSubject::new("S-7", "John Smith", EntityType::Individual);

        let result = orchestrator
            .screen(&subject, &all_lists(), &ScreeningOptions::new(as_of()))
            .await;
        assert_eq!(result.unwrap_err(), ScreeningError::ListUnavailable(ListSource::Un));

        let options = ScreeningOptions::new(as_of())
            .with_list_unavailable_policy(ListUnavailablePolicy::SkipAndReview);
        let result = orchestrator.screen(&subject, &all_lists(), &options).await.unwrap();
        assert_eq!(result.unavailable_lists, vec![ListSource::Un]);
        assert!(result.requires_review);
        assert_eq!(result.disposition, Disposition::Review);
    }

    #[tokio::test]
    async fn test_pep_match_with_related_persons() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-8", "Elena Vasquez", EntityType::Individual);

        let result = orchestrator
            .screen(&subject, &all_lists(), &ScreeningOptions::new(as_of()))
            .await
            .unwrap();

        let pep = result
            .pep_matches
            .iter()
            .find(|p| p.profile.pep_id == "PEP-1")
            .unwrap();
        assert_eq!(pep.strength, MatchStrength::Exact);
        assert_eq!(pep.assessment.risk_tier, RiskTier::High);
        assert_eq!(pep.related_persons.len(), 1);
        assert_eq!(result.overall_risk, RiskTier::High);
        assert!(result.requires_review);

        // Satisfied EDD clears the review requirement
        let options = ScreeningOptions::new(as_of())
            .with_edd_satisfied("PEP-1")
            .without_related_persons();
        let result = orchestrator.screen(&subject, &all_lists(), &options).await.unwrap();
        assert!(!result.requires_review);
        assert_eq!(result.disposition, Disposition::Clear);
        assert!(result.pep_matches.iter().all(|p| p.related_persons.is_empty()));
    }

    #[tokio::test]
    async fn test_organizations_skip_pep_screening() {
        let orchestrator = orchestrator(repository());
        let subject = ScreeningSubject::new("S-9", "Elena Vasquez Ltd", EntityType::Organization);

        let result = orchestrator
            .screen(&subject, &all_lists(), &ScreeningOptions::new(as_of()))
            .await
            .unwrap();
        assert!(result.pep_matches.is_empty());
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let sink = Arc::new(InMemoryEventSink::new());
        let orchestrator = orchestrator(repository()).with_event_sink(sink.clone());
        let subject = ScreeningSubject::new("S-10", "John Doe", EntityType::Individual);

        orchestrator
            .screen(&subject, &all_lists(), &ScreeningOptions::new(as_of()).without_pep())
            .await
            .unwrap();

        assert_eq!(sink.events_of_type("subject_screened").len(), 1);
        assert_eq!(sink.events_of_type("match_above_threshold").len(), 1);
    }

    #[tokio::test]
    async fn test_batch_deduplicates_ids() {
        let orchestrator = Arc::new(orchestrator(repository()));
        let subjects = vec![
            ScreeningSubject::new("S-1", "John Doe", EntityType::Individual),
            ScreeningSubject::new("S-1", "John Doe", EntityType::Individual),
            ScreeningSubject::new("S-2", "Jane Roe", EntityType::Individual),
        ];

        let results = orchestrator
            .screen_batch(subjects, &all_lists(), &ScreeningOptions::new(as_of()))
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(orchestrator.metrics().screening_requests_total.get(), 2);
    }

    #[test]
    fn test_prefilter_hint() {
        let orchestrator = orchestrator(repository());
        assert!((orchestrator.prefilter_hint() - 0.35).abs() < 1e-9);
    }
}
