//! Periodic rescreening
//!
//! Each subject has one [`ScreeningSchedule`]. The lifecycle is:
//!
//! ```text
//!   Scheduled ──(next_due ≤ as_of)──> Due ──claim (CAS)──> Executing
//!       ^                                                     │
//!       ├──────────── completed: next_due = as_of + interval ─┤
//!       ├──────────── failed, retryable: next_due = backoff ──┤
//!       │                                                     │
//!   ManualAttention <─── failed past retry limit / permanent ─┘
//! ```
//!
//! `Due` is derived from `next_due`, never stored. Claiming a due schedule is a
//! compare-and-swap on the store version, so two concurrent `execute_due` runs
//! never process the same subject twice: the loser yields. A claim carries a
//! lease. If the executor dies, the schedule becomes due again once the lease
//! expires.
//!
//! The scheduler has no timer of its own. An external trigger calls
//! [`RescreeningScheduler::execute_due`] with the current time.

mod retry;
mod store;

pub use retry::{RetryDecision, RetryStrategy};
pub use store::{InMemoryScheduleStore, ScheduleStore};

use crate::config::SchedulerConfig;
use crate::error::{Result, ScreeningError};
use crate::events::{EventEnvelope, EventSink, ScreeningEvent, TracingEventSink};
use crate::metrics::ScreeningMetrics;
use crate::orchestrator::{ListUnavailablePolicy, ScreeningOptions, ScreeningOrchestrator};
use crate::repository::SubjectDirectory;
use crate::types::{Disposition, ListSource, RiskTier, ScreeningResult, SubjectId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// Attempts at re-reading and re-writing a contended schedule
const MAX_CAS_ATTEMPTS: usize = 8;

// `at + by`, saturating at the latest representable instant
fn later(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Rescreening frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrequencyTier {
    /// Every day
    Daily,
    /// Every 7 days
    Weekly,
    /// Every 30 days
    Monthly,
    /// Every 90 days
    Quarterly,
    /// Every 180 days
    SemiAnnual,
    /// Every 365 days
    Annual,
}

impl FrequencyTier {
    /// Interval in days
    pub fn interval_days(&self) -> i64 {
        match self {
            FrequencyTier::Daily => 1,
            FrequencyTier::Weekly => 7,
            FrequencyTier::Monthly => 30,
            FrequencyTier::Quarterly => 90,
            FrequencyTier::SemiAnnual => 180,
            FrequencyTier::Annual => 365,
        }
    }

    /// Interval between screenings
    pub fn interval(&self) -> Duration {
        Duration::days(self.interval_days())
    }

    /// Conventional frequency for a risk tier. Callers choose; the scheduler never does.
    pub fn for_risk_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::High => FrequencyTier::Monthly,
            RiskTier::Medium => FrequencyTier::Quarterly,
            RiskTier::Low | RiskTier::None => FrequencyTier::Annual,
        }
    }
}

impl fmt::Display for FrequencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FrequencyTier::Daily => "DAILY",
            FrequencyTier::Weekly => "WEEKLY",
            FrequencyTier::Monthly => "MONTHLY",
            FrequencyTier::Quarterly => "QUARTERLY",
            FrequencyTier::SemiAnnual => "SEMI_ANNUAL",
            FrequencyTier::Annual => "ANNUAL",
        };
        f.write_str(label)
    }
}

/// How a scheduled rescreening is run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Lists to screen against
    pub lists: Vec<ListSource>,
    /// Include PEP screening
    pub include_pep: bool,
    /// Behaviour when a list is down
    pub on_list_unavailable: ListUnavailablePolicy,
    /// First due date; defaults to one interval after scheduling
    pub first_due: Option<DateTime<Utc>>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            lists: vec![ListSource::Ofac, ListSource::Eu, ListSource::Un, ListSource::UkHmt],
            include_pep: true,
            on_list_unavailable: ListUnavailablePolicy::Fail,
            first_due: None,
        }
    }
}

impl ScheduleOptions {
    /// Screen these lists
    pub fn with_lists(mut self, lists: Vec<ListSource>) -> Self {
        self.lists = lists;
        self
    }

    /// Make the first rescreening due at `first_due`
    pub fn starting_at(mut self, first_due: DateTime<Utc>) -> Self {
        self.first_due = Some(first_due);
        self
    }

    fn screening_options(&self, as_of: DateTime<Utc>) -> ScreeningOptions {
        let mut options =
            ScreeningOptions::new(as_of).with_list_unavailable_policy(self.on_list_unavailable);
        options.include_pep = self.include_pep;
        options
    }
}

/// Stored schedule state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScheduleState {
    /// Waiting for `next_due`
    Scheduled,
    /// Claimed by an executor
    Executing {
        /// Executor run that owns the claim
        run_id: Uuid,
        /// Claim is abandoned after this instant
        lease_expires: DateTime<Utc>,
    },
    /// Retries exhausted or permanent failure; excluded from due selection
    ManualAttention,
}

/// Observable status at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Waiting for `next_due`
    Scheduled,
    /// Eligible for execution
    Due,
    /// Claimed, lease still valid
    Executing,
    /// Needs a human
    ManualAttention,
}

/// Per-subject rescreening state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSchedule {
    /// Scheduled subject
    pub subject_id: SubjectId,
    /// Current frequency tier
    pub frequency: FrequencyTier,
    /// How the rescreening runs
    pub options: ScheduleOptions,
    /// Stored state
    pub state: ScheduleState,
    /// Next due instant
    pub next_due: DateTime<Utc>,
    /// Last successful execution
    pub last_executed: Option<DateTime<Utc>>,
    /// Consecutive failed executions
    pub consecutive_failures: u32,
    /// Most recent failure
    pub last_error: Option<String>,
    /// Risk tier of the last completed screening
    pub last_risk: Option<RiskTier>,
    /// When the schedule was created
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version, maintained by the store
    pub version: u64,
}

impl ScreeningSchedule {
    /// New schedule, first due one interval after `as_of` unless the options say otherwise
    pub fn new(
        subject_id: SubjectId,
        frequency: FrequencyTier,
        options: ScheduleOptions,
        as_of: DateTime<Utc>,
    ) -> Self {
        let next_due = options.first_due.unwrap_or_else(|| later(as_of, frequency.interval()));
        Self {
            subject_id,
            frequency,
            options,
            state: ScheduleState::Scheduled,
            next_due,
            last_executed: None,
            consecutive_failures: 0,
            last_error: None,
            last_risk: None,
            created_at: as_of,
            version: 0,
        }
    }

    /// Status at `as_of`
    pub fn status_at(&self, as_of: DateTime<Utc>) -> ScheduleStatus {
        match &self.state {
            ScheduleState::Scheduled if self.next_due <= as_of => ScheduleStatus::Due,
            ScheduleState::Scheduled => ScheduleStatus::Scheduled,
            ScheduleState::Executing { lease_expires, .. } if *lease_expires <= as_of => {
                ScheduleStatus::Due
            }
            ScheduleState::Executing { .. } => ScheduleStatus::Executing,
            ScheduleState::ManualAttention => ScheduleStatus::ManualAttention,
        }
    }

    /// Eligible for execution at `as_of`
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.status_at(as_of) == ScheduleStatus::Due
    }

    fn is_owned_by(&self, run_id: Uuid) -> bool {
        matches!(self.state, ScheduleState::Executing { run_id: owner, .. } if owner == run_id)
    }

    // Next due from the last run (or creation), never before the last run
    fn rebase(&mut self) {
        let anchor = self.last_executed.unwrap_or(self.created_at);
        self.next_due = later(anchor, self.frequency.interval());
    }

    // Caller-chosen due date, never before the last run
    fn due_at(&mut self, at: DateTime<Utc>) {
        self.next_due = match self.last_executed {
            Some(last) => at.max(last),
            None => at,
        };
    }
}

/// Result of one unit in a batch execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Rescreened; schedule advanced
    Completed {
        /// Disposition of the screening
        disposition: Disposition,
        /// Overall risk of the screening
        overall_risk: RiskTier,
        /// New due date
        next_due: DateTime<Utc>,
    },
    /// Failed; retry scheduled with backoff
    RetryScheduled {
        /// Consecutive failures so far
        attempt: u32,
        /// Retry due date
        next_due: DateTime<Utc>,
        /// Failure reason
        error: String,
    },
    /// Failed past the retry limit or permanently
    ManualAttention {
        /// Failure reason
        error: String,
    },
    /// Another executor owns the schedule; yielded
    Conflict,
    /// Not started (cancelled or the store was unreachable); still due
    Deferred,
}

/// Outcome of one `execute_due` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExecutionSummary {
    /// Run identifier, also the claim owner
    pub run_id: Uuid,
    /// Instant the run executed for
    pub as_of: DateTime<Utc>,
    /// Per-subject outcome
    pub outcomes: HashMap<SubjectId, UnitOutcome>,
}

impl BatchExecutionSummary {
    /// Due schedules seen by this run
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Completed rescreenings
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Completed { .. }))
    }

    /// Failures scheduled for retry
    pub fn retry_scheduled(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::RetryScheduled { .. }))
    }

    /// Schedules flagged for manual attention
    pub fn manual_attention(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::ManualAttention { .. }))
    }

    /// Units yielded to another executor
    pub fn conflicts(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Conflict))
    }

    /// Units left for a later run
    pub fn deferred(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Deferred))
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| predicate(o)).count()
    }
}

/// Drives periodic rescreening through the orchestrator
pub struct RescreeningScheduler {
    orchestrator: Arc<ScreeningOrchestrator>,
    directory: Arc<dyn SubjectDirectory>,
    store: Arc<dyn ScheduleStore>,
    retry: RetryStrategy,
    config: SchedulerConfig,
    events: Arc<dyn EventSink>,
    metrics: Arc<ScreeningMetrics>,
}

impl RescreeningScheduler {
    /// Create scheduler
    pub fn new(
        config: &SchedulerConfig,
        orchestrator: Arc<ScreeningOrchestrator>,
        directory: Arc<dyn SubjectDirectory>,
        store: Arc<dyn ScheduleStore>,
    ) -> Self {
        let metrics = Arc::clone(orchestrator.metrics());
        Self {
            orchestrator,
            directory,
            store,
            retry: RetryStrategy::new(config.retry.clone()),
            config: config.clone(),
            events: Arc::new(TracingEventSink),
            metrics,
        }
    }

    /// Deliver events to `sink` instead of the log
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Create or replace the schedule of a subject.
    /// An existing schedule keeps its history; only frequency and options change.
    pub async fn schedule_screening(
        &self,
        subject_id: SubjectId,
        frequency: FrequencyTier,
        options: ScheduleOptions,
        as_of: DateTime<Utc>,
    ) -> Result<ScreeningSchedule> {
        if subject_id.as_str().trim().is_empty() {
            return Err(ScreeningError::InvalidSubject("subject id is empty".to_string()));
        }

        if self.io("get", self.store.get(&subject_id)).await?.is_some() {
            let first_due = options.first_due;
            return self
                .modify(&subject_id, |schedule| {
                    schedule.frequency = frequency;
                    schedule.options = options.clone();
                    schedule.rebase();
                    if let Some(first_due) = first_due {
                        schedule.due_at(first_due);
                    }
                })
                .await;
        }

        let schedule = ScreeningSchedule::new(subject_id, frequency, options, as_of);
        let stored = self.io("upsert", self.store.upsert(schedule)).await?;
        info!(
            "Scheduled {} rescreening for {} (next due {})",
            stored.frequency, stored.subject_id, stored.next_due
        );
        Ok(stored)
    }

    /// Change the frequency of a schedule, effective immediately.
    /// Also re-arms a schedule waiting for manual attention.
    pub async fn update_frequency(
        &self,
        subject_id: &SubjectId,
        frequency: FrequencyTier,
    ) -> Result<ScreeningSchedule> {
        let updated = self
            .modify(subject_id, |schedule| {
                schedule.frequency = frequency;
                schedule.rebase();
                if schedule.state == ScheduleState::ManualAttention {
                    schedule.state = ScheduleState::Scheduled;
                    schedule.consecutive_failures = 0;
                }
            })
            .await?;
        info!(
            "Rescreening frequency for {} set to {} (next due {})",
            subject_id, frequency, updated.next_due
        );
        Ok(updated)
    }

    /// Remove a subject from future due selection
    pub async fn cancel_scheduled_screening(&self, subject_id: &SubjectId) -> Result<ScreeningSchedule> {
        let removed = self
            .io("remove", self.store.remove(subject_id))
            .await?
            .ok_or_else(|| ScreeningError::ScheduleNotFound(subject_id.clone()))?;
        info!("Cancelled rescreening for {}", subject_id);
        Ok(removed)
    }

    /// Re-arm a schedule flagged for manual attention; it becomes due at `as_of`
    pub async fn reset_manual_attention(
        &self,
        subject_id: &SubjectId,
        as_of: DateTime<Utc>,
    ) -> Result<ScreeningSchedule> {
        self.modify(subject_id, |schedule| {
            if schedule.state == ScheduleState::ManualAttention {
                schedule.state = ScheduleState::Scheduled;
                schedule.consecutive_failures = 0;
                schedule.last_error = None;
                schedule.due_at(as_of);
            }
        })
        .await
    }

    /// Current schedule of a subject
    pub async fn get_schedule(&self, subject_id: &SubjectId) -> Result<Option<ScreeningSchedule>> {
        self.io("get", self.store.get(subject_id)).await
    }

    /// Rescreen everything due at `as_of`
    pub async fn execute_due(self: &Arc<Self>, as_of: DateTime<Utc>) -> Result<BatchExecutionSummary> {
        self.execute_due_with_cancellation(as_of, CancellationToken::new())
            .await
    }

    /// Rescreen everything due at `as_of` until `cancel` fires.
    ///
    /// Units already claimed run to completion and commit; units not yet
    /// claimed are reported as `Deferred` and stay due.
    #[instrument(skip(self, cancel), fields(run_id))]
    pub async fn execute_due_with_cancellation(
        self: &Arc<Self>,
        as_of: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<BatchExecutionSummary> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let due = self.io("due", self.store.due(as_of)).await?;
        info!("Rescreening run {}: {} schedules due", run_id, due.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut outcomes = HashMap::with_capacity(due.len());
        let mut handles = Vec::with_capacity(due.len());

        for schedule in due {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                outcomes.insert(schedule.subject_id.clone(), UnitOutcome::Deferred);
                continue;
            };

            let scheduler = Arc::clone(self);
            let cancel = cancel.clone();
            let subject_id = schedule.subject_id.clone();
            let handle = tokio::spawn(async move {
                let outcome = scheduler.run_unit(schedule, run_id, as_of, &cancel).await;
                drop(permit);
                outcome
            });
            handles.push((subject_id, handle));
        }

        for (subject_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The claim lapses with its lease
                    error!("Rescreening task for {} aborted: {}", subject_id, e);
                    UnitOutcome::Deferred
                }
            };
            outcomes.insert(subject_id, outcome);
        }

        let summary = BatchExecutionSummary {
            run_id,
            as_of,
            outcomes,
        };
        info!(
            "Rescreening run {} finished: {} completed, {} retrying, {} manual attention, {} conflicts, {} deferred",
            run_id,
            summary.completed(),
            summary.retry_scheduled(),
            summary.manual_attention(),
            summary.conflicts(),
            summary.deferred()
        );
        Ok(summary)
    }

    async fn run_unit(
        &self,
        schedule: ScreeningSchedule,
        run_id: Uuid,
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        if cancel.is_cancelled() {
            return UnitOutcome::Deferred;
        }

        let subject_id = schedule.subject_id.clone();
        let claimed = match self.claim(schedule, run_id, as_of).await {
            Ok(claimed) => claimed,
            Err(ScreeningError::ScheduleConflict(_)) | Err(ScreeningError::ScheduleNotFound(_)) => {
                debug!("Schedule for {} claimed elsewhere; yielding", subject_id);
                self.metrics.rescreening_conflicts_total.inc();
                return UnitOutcome::Conflict;
            }
            Err(e) => {
                warn!("Could not claim schedule for {}: {}", subject_id, e);
                return UnitOutcome::Deferred;
            }
        };

        let result = self.rescreen(&claimed, as_of).await;

        match self.commit(&subject_id, run_id, as_of, result).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Could not commit rescreening for {}: {}", subject_id, e);
                UnitOutcome::Deferred
            }
        }
    }

    async fn claim(
        &self,
        schedule: ScreeningSchedule,
        run_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<ScreeningSchedule> {
        let lease_expires = i64::try_from(self.config.lease_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lease| as_of.checked_add_signed(lease))
            .ok_or_else(|| {
                ScreeningError::Config(format!(
                    "lease of {}s is out of range",
                    self.config.lease_seconds
                ))
            })?;

        let expected_version = schedule.version;
        let mut claimed = schedule;
        claimed.state = ScheduleState::Executing {
            run_id,
            lease_expires,
        };
        self.io(
            "compare_and_swap",
            self.store.compare_and_swap(claimed, expected_version),
        )
        .await
    }

    async fn rescreen(&self, schedule: &ScreeningSchedule, as_of: DateTime<Utc>) -> Result<ScreeningResult> {
        let subject = self
            .io("load_subject", self.directory.load_subject(&schedule.subject_id))
            .await?;
        let options = schedule.options.screening_options(as_of);
        self.orchestrator
            .screen(&subject, &schedule.options.lists, &options)
            .await
    }

    // Apply the outcome only while this run still owns the schedule
    async fn commit(
        &self,
        subject_id: &SubjectId,
        run_id: Uuid,
        as_of: DateTime<Utc>,
        result: Result<ScreeningResult>,
    ) -> Result<UnitOutcome> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(current) = self.io("get", self.store.get(subject_id)).await? else {
                debug!("Schedule for {} cancelled during rescreening", subject_id);
                return Ok(UnitOutcome::Conflict);
            };
            if !current.is_owned_by(run_id) {
                debug!("Schedule for {} taken over during rescreening", subject_id);
                self.metrics.rescreening_conflicts_total.inc();
                return Ok(UnitOutcome::Conflict);
            }

            let expected_version = current.version;
            let mut next = current;
            let (outcome, event) = self.transition(&mut next, as_of, &result);

            match self
                .io("compare_and_swap", self.store.compare_and_swap(next, expected_version))
                .await
            {
                Ok(_) => {
                    self.record(&outcome);
                    self.events.publish(EventEnvelope::new(event));
                    return Ok(outcome);
                }
                // Concurrent frequency change: re-read and merge
                Err(ScreeningError::ScheduleConflict(_)) => continue,
                Err(ScreeningError::ScheduleNotFound(_)) => return Ok(UnitOutcome::Conflict),
                Err(e) => return Err(e),
            }
        }
        Err(ScreeningError::ScheduleConflict(subject_id.clone()))
    }

    fn transition(
        &self,
        schedule: &mut ScreeningSchedule,
        as_of: DateTime<Utc>,
        result: &Result<ScreeningResult>,
    ) -> (UnitOutcome, ScreeningEvent) {
        let subject_id = schedule.subject_id.clone();

        match result {
            Ok(screening) => {
                schedule.state = ScheduleState::Scheduled;
                schedule.last_executed = Some(as_of);
                schedule.next_due = later(as_of, schedule.frequency.interval());
                schedule.consecutive_failures = 0;
                schedule.last_error = None;
                schedule.last_risk = Some(screening.overall_risk);

                (
                    UnitOutcome::Completed {
                        disposition: screening.disposition,
                        overall_risk: screening.overall_risk,
                        next_due: schedule.next_due,
                    },
                    ScreeningEvent::ScheduleAdvanced {
                        subject_id,
                        frequency: schedule.frequency,
                        next_due: schedule.next_due,
                    },
                )
            }
            Err(e) => {
                schedule.consecutive_failures += 1;
                schedule.last_error = Some(e.to_string());
                let attempt = schedule.consecutive_failures;

                match self.retry.decide(attempt, e) {
                    RetryDecision::Retry { delay } => {
                        schedule.state = ScheduleState::Scheduled;
                        schedule.next_due = later(as_of, delay);
                        warn!(
                            "Rescreening of {} failed (attempt {}/{}): {}; retry at {}",
                            subject_id,
                            attempt,
                            self.retry.max_retries(),
                            e,
                            schedule.next_due
                        );
                        (
                            UnitOutcome::RetryScheduled {
                                attempt,
                                next_due: schedule.next_due,
                                error: e.to_string(),
                            },
                            ScreeningEvent::ScheduleRetryScheduled {
                                subject_id,
                                attempt,
                                next_due: schedule.next_due,
                                error: e.to_string(),
                            },
                        )
                    }
                    RetryDecision::GiveUp => {
                        schedule.state = ScheduleState::ManualAttention;
                        error!(
                            "Rescreening of {} needs manual attention after {} failures: {}",
                            subject_id, attempt, e
                        );
                        (
                            UnitOutcome::ManualAttention {
                                error: e.to_string(),
                            },
                            ScreeningEvent::ScheduleFailedPastRetryLimit {
                                subject_id,
                                attempts: attempt,
                                error: e.to_string(),
                            },
                        )
                    }
                }
            }
        }
    }

    fn record(&self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Completed { .. } => self.metrics.rescreening_completed_total.inc(),
            UnitOutcome::RetryScheduled { .. } => self.metrics.rescreening_failed_total.inc(),
            UnitOutcome::ManualAttention { .. } => {
                self.metrics.rescreening_failed_total.inc();
                self.metrics.rescreening_escalated_total.inc();
            }
            UnitOutcome::Conflict | UnitOutcome::Deferred => {}
        }
    }

    // Read-modify-CAS with bounded retries on contention
    async fn modify<F>(&self, subject_id: &SubjectId, mut apply: F) -> Result<ScreeningSchedule>
    where
        F: FnMut(&mut ScreeningSchedule),
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .io("get", self.store.get(subject_id))
                .await?
                .ok_or_else(|| ScreeningError::ScheduleNotFound(subject_id.clone()))?;
            let expected_version = current.version;
            let mut next = current;
            apply(&mut next);

            match self
                .io("compare_and_swap", self.store.compare_and_swap(next, expected_version))
                .await
            {
                Err(ScreeningError::ScheduleConflict(_)) => continue,
                other => return other,
            }
        }
        Err(ScreeningError::ScheduleConflict(subject_id.clone()))
    }

    // Directory and store calls share one per-call timeout; expiry is transient
    async fn io<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = std::time::Duration::from_millis(self.config.io_timeout_ms);
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ScreeningError::RepositoryTimeout {
                operation: operation.to_string(),
                timeout_ms: self.config.io_timeout_ms,
            })?
    }
}
