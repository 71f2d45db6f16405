// Metrics and observability module
// This file defines the exporter's own instrumentation: the API call counter
// and per-collector cycle telemetry, all registered into an injected registry
//
// Numan Thabit 2025 Nov

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::errors::ExporterError;

/// Counts remote PagerDuty calls by operation name.
#[derive(Clone)]
pub struct ApiCounter {
    calls: IntCounterVec,
}

impl ApiCounter {
    pub fn new(registry: &Registry) -> Result<Self, ExporterError> {
        let calls = IntCounterVec::new(
            Opts::new("pagerduty_api_counter", "PagerDuty api call counter"),
            &["name"],
        )?;
        registry.register(Box::new(calls.clone()))?;
        Ok(Self { calls })
    }

    pub fn inc(&self, operation: &str) {
        self.calls.with_label_values(&[operation]).inc();
    }

    #[cfg(test)]
    pub fn get(&self, operation: &str) -> u64 {
        self.calls.with_label_values(&[operation]).get()
    }
}

/// Duration and failure tracking per collector cycle.
#[derive(Clone)]
pub struct CollectorTelemetry {
    duration: GaugeVec,
    errors: IntCounterVec,
}

impl CollectorTelemetry {
    pub fn new(registry: &Registry) -> Result<Self, ExporterError> {
        let duration = GaugeVec::new(
            Opts::new(
                "pagerduty_collector_duration_seconds",
                "duration of the last completed collection cycle",
            ),
            &["collector"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "pagerduty_collector_errors_total",
                "collection cycles aborted before publishing",
            ),
            &["collector"],
        )?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        Ok(Self { duration, errors })
    }

    pub fn observe_duration(&self, collector: &str, seconds: f64) {
        self.duration.with_label_values(&[collector]).set(seconds);
    }

    pub fn record_error(&self, collector: &str) {
        self.errors.with_label_values(&[collector]).inc();
    }

    #[cfg(test)]
    pub fn errors(&self, collector: &str) -> u64 {
        self.errors.with_label_values(&[collector]).get()
    }
}

/// Render every family in the registry in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<String, ExporterError> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExporterError::Decode(format!("metrics utf8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_counter_counts_per_operation() {
        let registry = Registry::new();
        let counter = ApiCounter::new(&registry).unwrap();
        counter.inc("ListTeams");
        counter.inc("ListTeams");
        counter.inc("ListOnCalls");
        assert_eq!(counter.get("ListTeams"), 2);
        assert_eq!(counter.get("ListOnCalls"), 1);
        assert_eq!(counter.get("ListMaintenanceWindows"), 0);

        let text = render(&registry).unwrap();
        assert!(text.contains(r#"pagerduty_api_counter{name="ListTeams"} 2"#));
    }

    #[test]
    fn only_issued_operations_are_exported() {
        let registry = Registry::new();
        let counter = ApiCounter::new(&registry).unwrap();
        let telemetry = CollectorTelemetry::new(&registry).unwrap();
        counter.inc("ListTeams");
        telemetry.observe_duration("team", 0.2);

        let text = render(&registry).unwrap();
        assert!(text.contains(r#"pagerduty_api_counter{name="ListTeams"} 1"#));
        assert!(!text.contains("ListOnCalls"));
        assert!(!text.contains("pagerduty_collector_errors_total{"));
    }

    #[test]
    fn registering_twice_into_one_registry_fails() {
        let registry = Registry::new();
        ApiCounter::new(&registry).unwrap();
        assert!(matches!(
            ApiCounter::new(&registry),
            Err(ExporterError::Metrics(_))
        ));
    }

    #[test]
    fn telemetry_tracks_errors_and_duration() {
        let registry = Registry::new();
        let telemetry = CollectorTelemetry::new(&registry).unwrap();
        telemetry.record_error("team");
        telemetry.observe_duration("oncall", 1.5);
        assert_eq!(telemetry.errors("team"), 1);

        let text = render(&registry).unwrap();
        assert!(text.contains(r#"pagerduty_collector_duration_seconds{collector="oncall"} 1.5"#));
    }
}
