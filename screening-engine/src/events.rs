//! Audit events emitted by the orchestrator and the scheduler

use crate::classifier::MatchStrength;
use crate::scheduler::FrequencyTier;
use crate::types::{Disposition, ListSource, RiskTier, SubjectId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Engine event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreeningEvent {
    /// A screening call produced a result
    SubjectScreened {
        /// Screening identifier
        screening_id: Uuid,
        /// Screened subject
        subject_id: SubjectId,
        /// Resulting disposition
        disposition: Disposition,
        /// Overall risk
        overall_risk: RiskTier,
        /// Number of sanctions matches
        sanctions_matches: usize,
        /// Number of PEP matches
        pep_matches: usize,
    },

    /// A sanctions match at HIGH strength or above
    MatchAboveThreshold {
        /// Screening identifier
        screening_id: Uuid,
        /// Screened subject
        subject_id: SubjectId,
        /// List of the matched entry
        list_source: ListSource,
        /// Matched entry
        entry_id: String,
        /// Match strength
        strength: MatchStrength,
        /// Score on the 0-100 scale
        score: f64,
    },

    /// A rescreening completed and the schedule moved forward
    ScheduleAdvanced {
        /// Rescreened subject
        subject_id: SubjectId,
        /// Frequency tier in force
        frequency: FrequencyTier,
        /// New due date
        next_due: DateTime<Utc>,
    },

    /// A rescreening failed and will be retried
    ScheduleRetryScheduled {
        /// Rescreened subject
        subject_id: SubjectId,
        /// Consecutive failures so far
        attempt: u32,
        /// Retry due date
        next_due: DateTime<Utc>,
        /// Failure reason
        error: String,
    },

    /// A rescreening failed permanently and needs a human
    ScheduleFailedPastRetryLimit {
        /// Rescreened subject
        subject_id: SubjectId,
        /// Consecutive failures
        attempts: u32,
        /// Last failure reason
        error: String,
    },
}

impl ScreeningEvent {
    /// Event type label
    pub fn event_type(&self) -> &'static str {
        match self {
            ScreeningEvent::SubjectScreened { .. } => "subject_screened",
            ScreeningEvent::MatchAboveThreshold { .. } => "match_above_threshold",
            ScreeningEvent::ScheduleAdvanced { .. } => "schedule_advanced",
            ScreeningEvent::ScheduleRetryScheduled { .. } => "schedule_retry_scheduled",
            ScreeningEvent::ScheduleFailedPastRetryLimit { .. } => "schedule_failed_past_retry_limit",
        }
    }

    /// Subject the event is about
    pub fn subject_id(&self) -> &SubjectId {
        match self {
            ScreeningEvent::SubjectScreened { subject_id, .. }
            | ScreeningEvent::MatchAboveThreshold { subject_id, .. }
            | ScreeningEvent::ScheduleAdvanced { subject_id, .. }
            | ScreeningEvent::ScheduleRetryScheduled { subject_id, .. }
            | ScreeningEvent::ScheduleFailedPastRetryLimit { subject_id, .. } => subject_id,
        }
    }
}

/// Event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event ID (UUIDv7 for ordering)
    pub id: Uuid,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Event payload
    pub event: ScreeningEvent,
}

impl EventEnvelope {
    /// Wrap an event
    pub fn new(event: ScreeningEvent) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Consumer of engine events (audit trail, notifications)
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block for long.
    fn publish(&self, envelope: EventEnvelope);
}

/// Writes events to the tracing pipeline as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, envelope: EventEnvelope) {
        let event_type = envelope.event.event_type();
        match serde_json::to_string(&envelope) {
            Ok(payload) => info!(
                event_type,
                subject_id = %envelope.event.subject_id(),
                payload = %payload,
                "Screening event"
            ),
            Err(e) => warn!("Failed to serialize {} event: {}", event_type, e),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl InMemoryEventSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<ScreeningEvent> {
        self.events.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Recorded events of one type
    pub fn events_of_type(&self, event_type: &str) -> Vec<ScreeningEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event.event_type() == event_type)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// No events recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, envelope: EventEnvelope) {
        self.events.lock().push(envelope);
    }
}
