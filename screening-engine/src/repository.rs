//! Collaborators consumed by the engine: watchlist/PEP data and subject identity
//!
//! Production deployments back these traits with a database or a vendor API.
//! The in-memory implementations serve tests and embedding applications.

use crate::error::{Result, ScreeningError};
use crate::normalizer::{NameNormalizer, NormalizedName};
use crate::pep::PepProfile;
use crate::similarity::edit_similarity;
use crate::types::{ListSource, ScreeningSubject, SubjectId, WatchlistCandidate};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only watchlist and PEP registry
#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Candidates from one list whose names may resemble `name`.
    /// `min_similarity_hint` (0-1) lets the data layer pre-filter; it is not a guarantee.
    async fn find_candidates(
        &self,
        name: &NormalizedName,
        list_source: &ListSource,
        min_similarity_hint: f64,
    ) -> Result<Vec<WatchlistCandidate>>;

    /// PEP registry records whose names may resemble `name`
    async fn find_pep_candidates(
        &self,
        name: &NormalizedName,
        min_similarity_hint: f64,
    ) -> Result<Vec<PepProfile>>;

    /// Relatives and close associates of a PEP
    async fn get_related_persons(&self, pep_id: &str) -> Result<Vec<PepProfile>>;

    /// Whether a list source is currently reachable
    async fn is_list_available(&self, list_source: &ListSource) -> Result<bool>;
}

/// Identity data for subjects rescreened by id
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Load the current identity record of a subject
    async fn load_subject(&self, subject_id: &SubjectId) -> Result<ScreeningSubject>;
}

/// In-memory watchlist repository
pub struct InMemoryWatchlistRepository {
    // list -> (entry_id -> candidate)
    lists: Arc<DashMap<ListSource, DashMap<String, WatchlistCandidate>>>,
    peps: Arc<DashMap<String, PepProfile>>,
    unavailable: Arc<DashSet<ListSource>>,
    normalizer: NameNormalizer,
}

impl InMemoryWatchlistRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            lists: Arc::new(DashMap::new()),
            peps: Arc::new(DashMap::new()),
            unavailable: Arc::new(DashSet::new()),
            normalizer: NameNormalizer::default(),
        }
    }

    /// Load (or replace) a watchlist
    pub fn load_list(&self, list_source: ListSource, entries: Vec<WatchlistCandidate>) {
        let map = DashMap::new();
        for mut entry in entries {
            entry.list_source = list_source.clone();
            map.insert(entry.entry_id.clone(), entry);
        }

        let count = map.len();
        self.lists.insert(list_source.clone(), map);
        info!("Loaded {} watchlist with {} entries", list_source, count);
    }

    /// Add or replace a PEP registry record
    pub fn add_pep(&self, profile: PepProfile) {
        self.peps.insert(profile.pep_id.clone(), profile);
    }

    /// Mark a list source reachable or unreachable
    pub fn set_list_available(&self, list_source: &ListSource, available: bool) {
        if available {
            self.unavailable.remove(list_source);
        } else {
            self.unavailable.insert(list_source.clone());
        }
    }

    /// Total entries across all lists
    pub fn total_entries(&self) -> usize {
        self.lists.iter().map(|l| l.value().len()).sum()
    }

    /// Loaded list sources, sorted
    pub fn loaded_lists(&self) -> Vec<ListSource> {
        let mut lists: Vec<ListSource> = self.lists.iter().map(|l| l.key().clone()).collect();
        lists.sort();
        lists
    }

    // Cheap data-layer filter: close enough by edit distance, or any token in common
    fn passes_prefilter<'a>(
        &self,
        name: &NormalizedName,
        names: impl IntoIterator<Item = &'a String>,
        hint: f64,
    ) -> bool {
        names.into_iter().any(|candidate| {
            let candidate = self.normalizer.normalize(candidate);
            edit_similarity(name, &candidate) >= hint
                || candidate.tokens().iter().any(|t| name.tokens().contains(t))
        })
    }
}

impl Default for InMemoryWatchlistRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatchlistRepository for InMemoryWatchlistRepository {
    async fn find_candidates(
        &self,
        name: &NormalizedName,
        list_source: &ListSource,
        min_similarity_hint: f64,
    ) -> Result<Vec<WatchlistCandidate>> {
        if self.unavailable.contains(list_source) {
            return Err(ScreeningError::ListUnavailable(list_source.clone()));
        }

        let Some(entries) = self.lists.get(list_source) else {
            return Ok(Vec::new());
        };

        let candidates: Vec<WatchlistCandidate> = entries
            .iter()
            .filter(|e| {
                let entry = e.value();
                self.passes_prefilter(
                    name,
                    std::iter::once(&entry.name).chain(entry.aliases.iter()),
                    min_similarity_hint,
                )
            })
            .map(|e| e.value().clone())
            .collect();

        debug!(
            "{} candidates from {} for '{}'",
            candidates.len(),
            list_source,
            name.as_str()
        );
        Ok(candidates)
    }

    async fn find_pep_candidates(
        &self,
        name: &NormalizedName,
        min_similarity_hint: f64,
    ) -> Result<Vec<PepProfile>> {
        Ok(self
            .peps
            .iter()
            .filter(|p| {
                let profile = p.value();
                self.passes_prefilter(
                    name,
                    std::iter::once(&profile.name).chain(profile.aliases.iter()),
                    min_similarity_hint,
                )
            })
            .map(|p| p.value().clone())
            .collect())
    }

    async fn get_related_persons(&self, pep_id: &str) -> Result<Vec<PepProfile>> {
        let Some(profile) = self.peps.get(pep_id) else {
            return Ok(Vec::new());
        };
        let related_ids = profile.related_person_ids.clone();
        drop(profile);

        Ok(related_ids
            .iter()
            .filter_map(|id| self.peps.get(id).map(|p| p.value().clone()))
            .collect())
    }

    async fn is_list_available(&self, list_source: &ListSource) -> Result<bool> {
        Ok(!self.unavailable.contains(list_source))
    }
}

/// In-memory subject directory
#[derive(Default)]
pub struct InMemorySubjectDirectory {
    subjects: DashMap<SubjectId, ScreeningSubject>,
}

impl InMemorySubjectDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a subject
    pub fn insert(&self, subject: ScreeningSubject) {
        self.subjects.insert(subject.id.clone(), subject);
    }

    /// Remove a subject
    pub fn remove(&self, subject_id: &SubjectId) -> Option<ScreeningSubject> {
        self.subjects.remove(subject_id).map(|(_, s)| s)
    }
}

#[async_trait]
impl SubjectDirectory for InMemorySubjectDirectory {
    async fn load_subject(&self, subject_id: &SubjectId) -> Result<ScreeningSubject> {
        self.subjects
            .get(subject_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ScreeningError::SubjectNotFound(subject_id.clone()))
    }
}
