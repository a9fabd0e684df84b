//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use screening_engine::{
    InMemoryWatchlistRepository, ListSource, NormalizedName, PepProfile, Result,
    WatchlistCandidate, WatchlistRepository,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Route engine logs to the test writer (once per binary)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn watchlists() -> Arc<InMemoryWatchlistRepository> {
    let repo = InMemoryWatchlistRepository::new();
    repo.load_list(
        ListSource::Ofac,
        vec![
            WatchlistCandidate::new("OFAC-1001", ListSource::Ofac, "Mohammed Al Rahman")
                .with_program("SDGT"),
            WatchlistCandidate::new("OFAC-1002", ListSource::Ofac, "Ivan Petrov")
                .with_alias("Ivan Petroff")
                .with_program("RUSSIA-EO14024"),
        ],
    );
    repo.load_list(
        ListSource::Eu,
        vec![WatchlistCandidate::new("EU-2001", ListSource::Eu, "Peter Johnson")],
    );
    Arc::new(repo)
}

/// Repository whose candidate lookups hang for selected names
pub struct SlowRepository {
    inner: Arc<InMemoryWatchlistRepository>,
    slow_names: HashSet<String>,
    delay: Duration,
}

impl SlowRepository {
    pub fn new(inner: Arc<InMemoryWatchlistRepository>, delay: Duration) -> Self {
        Self {
            inner,
            slow_names: HashSet::new(),
            delay,
        }
    }

    /// `normalized` must be the normalized form, e.g. "ivan petrov"
    pub fn slow_for(mut self, normalized: &str) -> Self {
        self.slow_names.insert(normalized.to_string());
        self
    }
}

#[async_trait]
impl WatchlistRepository for SlowRepository {
    async fn find_candidates(
        &self,
        name: &NormalizedName,
        list_source: &ListSource,
        min_similarity_hint: f64,
    ) -> Result<Vec<WatchlistCandidate>> {
        if self.slow_names.contains(name.as_str()) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner
            .find_candidates(name, list_source, min_similarity_hint)
            .await
    }

    async fn find_pep_candidates(
        &self,
        name: &NormalizedName,
        min_similarity_hint: f64,
    ) -> Result<Vec<PepProfile>> {
        self.inner.find_pep_candidates(name, min_similarity_hint).await
    }

    async fn get_related_persons(&self, pep_id: &str) -> Result<Vec<PepProfile>> {
        self.inner.get_related_persons(pep_id).await
    }

    async fn is_list_available(&self, list_source: &ListSource) -> Result<bool> {
        self.inner.is_list_available(list_source).await
    }
}
