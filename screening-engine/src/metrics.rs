// Prometheus metrics for the screening engine
// Tracks: screening volume and latency, match strengths, dispositions, rescreening outcomes

use crate::classifier::MatchStrength;
use crate::error::{Result, ScreeningError};
use crate::types::Disposition;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Engine metrics on a private registry
pub struct ScreeningMetrics {
    registry: Registry,

    // Screening metrics
    /// Screening calls
    pub screening_requests_total: IntCounter,
    /// Screening calls that failed
    pub screening_errors_total: IntCounter,
    /// Sanctions matches by strength
    pub screening_matches_total: IntCounterVec,
    /// Results by disposition
    pub screening_dispositions_total: IntCounterVec,
    /// Screening latency
    pub screening_duration_seconds: Histogram,

    // Rescreening metrics
    /// Rescreenings completed
    pub rescreening_completed_total: IntCounter,
    /// Rescreenings failed
    pub rescreening_failed_total: IntCounter,
    /// Schedules escalated to manual attention
    pub rescreening_escalated_total: IntCounter,
    /// Schedules yielded to another executor
    pub rescreening_conflicts_total: IntCounter,
}

impl ScreeningMetrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        Self::build().map_err(|e| ScreeningError::Internal(format!("metrics registration: {}", e)))
    }

    fn build() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let screening_requests_total = register_int_counter_with_registry!(
            Opts::new("screening_requests_total", "Total screening calls"),
            registry
        )?;

        let screening_errors_total = register_int_counter_with_registry!(
            Opts::new("screening_errors_total", "Screening calls that returned an error"),
            registry
        )?;

        let screening_matches_total = register_int_counter_vec_with_registry!(
            Opts::new("screening_matches_total", "Sanctions matches by strength"),
            &["strength"],
            registry
        )?;

        let screening_dispositions_total = register_int_counter_vec_with_registry!(
            Opts::new("screening_dispositions_total", "Screening results by disposition"),
            &["disposition"],
            registry
        )?;

        let screening_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "screening_duration_seconds",
                "Screening call duration in seconds"
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            registry
        )?;

        let rescreening_completed_total = register_int_counter_with_registry!(
            Opts::new("rescreening_completed_total", "Scheduled rescreenings completed"),
            registry
        )?;

        let rescreening_failed_total = register_int_counter_with_registry!(
            Opts::new("rescreening_failed_total", "Scheduled rescreenings that failed"),
            registry
        )?;

        let rescreening_escalated_total = register_int_counter_with_registry!(
            Opts::new(
                "rescreening_escalated_total",
                "Schedules flagged for manual attention"
            ),
            registry
        )?;

        let rescreening_conflicts_total = register_int_counter_with_registry!(
            Opts::new(
                "rescreening_conflicts_total",
                "Schedules yielded to a concurrent executor"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            screening_requests_total,
            screening_errors_total,
            screening_matches_total,
            screening_dispositions_total,
            screening_duration_seconds,
            rescreening_completed_total,
            rescreening_failed_total,
            rescreening_escalated_total,
            rescreening_conflicts_total,
        })
    }

    /// Count one sanctions match
    pub fn record_match(&self, strength: MatchStrength) {
        self.screening_matches_total
            .with_label_values(&[strength.as_str()])
            .inc();
    }

    /// Count one result and observe its duration
    pub fn record_result(&self, disposition: Disposition, elapsed: Duration) {
        self.screening_dispositions_total
            .with_label_values(&[disposition.as_str()])
            .inc();
        self.screening_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Metric families of this registry
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.gather(), &mut buffer)
            .map_err(|e| ScreeningError::Internal(format!("metrics encoding: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| ScreeningError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ScreeningMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_independent_registries() {
        let a = ScreeningMetrics::new().unwrap();
        let b = ScreeningMetrics::new().unwrap();
        a.screening_requests_total.inc();
        assert_eq!(a.screening_requests_total.get(), 1);
        assert_eq!(b.screening_requests_total.get(), 0);
    }

    #[test]
    fn test_labelled_counters() {
        let metrics = ScreeningMetrics::new().unwrap();
        metrics.record_match(MatchStrength::High);
        metrics.record_match(MatchStrength::High);
        metrics.record_result(Disposition::Review, Duration::from_millis(12));

        assert_eq!(
            metrics
                .screening_matches_total
                .with_label_values(&["high"])
                .get(),
            2
        );
        let text = metrics.render().unwrap();
        assert!(text.contains("screening_dispositions_total{disposition=\"review\"} 1"));
        assert!(text.contains("screening_duration_seconds_count 1"));
    }
}
