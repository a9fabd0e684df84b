//! Schedule persistence with optimistic versioning

use super::ScreeningSchedule;
use crate::error::{Result, ScreeningError};
use crate::types::SubjectId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Store of rescreening schedules, the only mutable shared state of the engine.
///
/// Every successful write bumps `version`. `compare_and_swap` is the only
/// write used while a schedule may be contended.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Unconditional write. Returns the stored schedule with its new version.
    async fn upsert(&self, schedule: ScreeningSchedule) -> Result<ScreeningSchedule>;

    /// Current schedule of a subject
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<ScreeningSchedule>>;

    /// Delete a schedule
    async fn remove(&self, subject_id: &SubjectId) -> Result<Option<ScreeningSchedule>>;

    /// Schedules due at `as_of`, including expired executions
    async fn due(&self, as_of: DateTime<Utc>) -> Result<Vec<ScreeningSchedule>>;

    /// Write only if the stored version still equals `expected_version`.
    /// Fails with `ScheduleConflict` otherwise, `ScheduleNotFound` if absent.
    async fn compare_and_swap(
        &self,
        schedule: ScreeningSchedule,
        expected_version: u64,
    ) -> Result<ScreeningSchedule>;
}

/// In-memory schedule store
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    schedules: DashMap<SubjectId, ScreeningSchedule>,
}

impl InMemoryScheduleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored schedules
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    /// No schedules stored
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn upsert(&self, mut schedule: ScreeningSchedule) -> Result<ScreeningSchedule> {
        match self.schedules.entry(schedule.subject_id.clone()) {
            Entry::Occupied(mut entry) => {
                schedule.version = entry.get().version + 1;
                entry.insert(schedule.clone());
            }
            Entry::Vacant(entry) => {
                schedule.version = 0;
                entry.insert(schedule.clone());
            }
        }
        Ok(schedule)
    }

    async fn get(&self, subject_id: &SubjectId) -> Result<Option<ScreeningSchedule>> {
        Ok(self.schedules.get(subject_id).map(|s| s.value().clone()))
    }

    async fn remove(&self, subject_id: &SubjectId) -> Result<Option<ScreeningSchedule>> {
        Ok(self.schedules.remove(subject_id).map(|(_, s)| s))
    }

    async fn due(&self, as_of: DateTime<Utc>) -> Result<Vec<ScreeningSchedule>> {
        let mut due: Vec<ScreeningSchedule> = self
            .schedules
            .iter()
            .filter(|s| s.value().is_due(as_of))
            .map(|s| s.value().clone())
            .collect();
        due.sort_by(|a, b| {
            a.next_due
                .cmp(&b.next_due)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        Ok(due)
    }

    async fn compare_and_swap(
        &self,
        mut schedule: ScreeningSchedule,
        expected_version: u64,
    ) -> Result<ScreeningSchedule> {
        // The shard lock is held from the version check to the write
        let mut current = self
            .schedules
            .get_mut(&schedule.subject_id)
            .ok_or_else(|| ScreeningError::ScheduleNotFound(schedule.subject_id.clone()))?;

        if current.version != expected_version {
            return Err(ScreeningError::ScheduleConflict(schedule.subject_id.clone()));
        }

        schedule.version = expected_version + 1;
        *current = schedule.clone();
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FrequencyTier, ScheduleOptions, ScheduleState};
    use chrono::{Duration, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn schedule(id: &str, next_due: DateTime<Utc>) -> ScreeningSchedule {
        let mut schedule = ScreeningSchedule::new(
            SubjectId::new(id),
            FrequencyTier::Monthly,
            ScheduleOptions::default(),
            as_of(),
        );
        schedule.next_due = next_due;
        schedule
    }

    #[tokio::test]
    async fn test_upsert_bumps_version() {
        let store = InMemoryScheduleStore::new();
        let first = store.upsert(schedule("S-1", as_of())).await.unwrap();
        assert_eq!(first.version, 0);
        let second = store.upsert(schedule("S-1", as_of())).await.unwrap();
        assert_eq!(second.version, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryScheduleStore::new();
        let stored = store.upsert(schedule("S-1", as_of())).await.unwrap();

        let mut update = stored.clone();
        update.frequency = FrequencyTier::Weekly;
        let updated = store.compare_and_swap(update, stored.version).await.unwrap();
        assert_eq!(updated.version, 1);

        // Stale writer loses
        let stale = store.compare_and_swap(stored.clone(), stored.version).await;
        assert_eq!(
            stale.unwrap_err(),
            ScreeningError::ScheduleConflict(SubjectId::new("S-1"))
        );

        let missing = store.compare_and_swap(schedule("S-9", as_of()), 0).await;
        assert!(matches!(missing, Err(ScreeningError::ScheduleNotFound(_))));
    }

    #[tokio::test]
    async fn test_due_selection() {
        let store = InMemoryScheduleStore::new();
        store.upsert(schedule("S-late", as_of() + Duration::days(3))).await.unwrap();
        store.upsert(schedule("S-b", as_of() - Duration::days(1))).await.unwrap();
        store.upsert(schedule("S-a", as_of() - Duration::days(1))).await.unwrap();
        store.upsert(schedule("S-now", as_of())).await.unwrap();

        let mut attention = schedule("S-stuck", as_of() - Duration::days(10));
        attention.state = ScheduleState::ManualAttention;
        store.upsert(attention).await.unwrap();

        let due: Vec<String> = store
            .due(as_of())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.subject_id.to_string())
            .collect();
        assert_eq!(due, vec!["S-a", "S-b", "S-now"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryScheduleStore::new();
        store.upsert(schedule("S-1", as_of())).await.unwrap();
        assert!(store.remove(&SubjectId::new("S-1")).await.unwrap().is_some());
        assert!(store.get(&SubjectId::new("S-1")).await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
