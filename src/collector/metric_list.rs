// Per-cycle metric sample accumulator
// Samples are buffered here while a collector pages through the API and are
// only made visible when the whole list is swapped into a published gauge
//
// Numan Thabit 2025 Nov

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use super::gauge::PublishedGauge;
use crate::errors::ExporterError;

/// Label name to value, ordered by name.
pub type Labels = BTreeMap<String, String>;

/// Value emitted for timestamps that are missing, unparseable or before the epoch.
pub const TIMESTAMP_SENTINEL: f64 = 1.0;

/// Build a label set from `(name, value)` pairs.
pub fn labels<K, V, I>(pairs: I) -> Labels
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: Labels,
    pub value: f64,
}

/// Insertion-ordered samples, at most one per label set.
#[derive(Debug, Default)]
pub struct MetricList {
    samples: Vec<MetricSample>,
    index: HashMap<Labels, usize>,
}

impl MetricList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an entity with these labels exists.
    pub fn add_info(&mut self, labels: Labels) {
        self.add(labels, 1.0);
    }

    /// Upsert a numeric sample for the label set.
    pub fn add(&mut self, labels: Labels, value: f64) {
        match self.index.get(&labels) {
            Some(&pos) => self.samples[pos].value = value,
            None => {
                self.index.insert(labels.clone(), self.samples.len());
                self.samples.push(MetricSample { labels, value });
            }
        }
    }

    /// Upsert a UNIX epoch sample, see [`timestamp_value`].
    pub fn add_time(&mut self, labels: Labels, timestamp: Option<DateTime<Utc>>) {
        self.add(labels, timestamp_value(timestamp));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<MetricSample> {
        self.samples
    }

    /// Replace the gauge's published state with this list.
    pub fn gauge_set(self, gauge: &PublishedGauge) -> Result<(), ExporterError> {
        gauge.replace(self.samples)
    }
}

/// Epoch seconds of `timestamp`, floored to [`TIMESTAMP_SENTINEL`] when absent or negative.
pub fn timestamp_value(timestamp: Option<DateTime<Utc>>) -> f64 {
    match timestamp {
        Some(ts) if ts.timestamp() >= 0 => ts.timestamp() as f64,
        _ => TIMESTAMP_SENTINEL,
    }
}

/// Parse an RFC 3339 timestamp as returned by the PagerDuty API.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
