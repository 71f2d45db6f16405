// Published gauge families
// Prometheus collectors whose whole sample set is swapped at once, so a
// scrape always encodes exactly one completed collection cycle
//
// Numan Thabit 2025 Nov

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::metric_list::{Labels, MetricSample};
use crate::errors::ExporterError;

/// Gauge families that share one snapshot lock.
///
/// Registered as a single collector, so every scrape reads all members under
/// the same read guard and [`GaugeSet::replace`] swaps all of them at once.
#[derive(Clone)]
pub struct GaugeSet {
    inner: Arc<Inner>,
}

struct Member {
    desc: Desc,
    label_names: BTreeSet<String>,
}

struct Inner {
    members: Vec<Member>,
    snapshot: RwLock<Vec<Vec<MetricSample>>>,
}

impl Member {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, ExporterError> {
        let variable_labels: Vec<String> = label_names.iter().map(|l| l.to_string()).collect();
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            variable_labels.clone(),
            HashMap::new(),
        )?;
        Ok(Self {
            desc,
            label_names: variable_labels.into_iter().collect(),
        })
    }

    fn check(&self, samples: &[MetricSample]) -> Result<(), ExporterError> {
        match samples
            .iter()
            .find(|s| !s.labels.keys().eq(self.label_names.iter()))
        {
            Some(bad) => Err(ExporterError::LabelMismatch {
                family: self.desc.fq_name.clone(),
                expected: self.label_names.iter().cloned().collect(),
                got: bad.labels.keys().cloned().collect(),
            }),
            None => Ok(()),
        }
    }

    fn encode(&self, samples: &[MetricSample]) -> MetricFamily {
        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(MetricType::GAUGE);

        for sample in samples {
            let mut metric = Metric::default();
            // BTreeMap iteration keeps label pairs sorted by name
            for (name, value) in &sample.labels {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                metric.mut_label().push(pair);
            }
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
            family.mut_metric().push(metric);
        }
        family
    }
}

impl GaugeSet {
    /// One member per `(name, help, label names)` entry, addressed by position.
    pub fn new(gauges: &[(&str, &str, &[&str])]) -> Result<Self, ExporterError> {
        let members = gauges
            .iter()
            .map(|(name, help, label_names)| Member::new(name, help, label_names))
            .collect::<Result<Vec<_>, _>>()?;
        let snapshot = RwLock::new(vec![Vec::new(); members.len()]);
        Ok(Self {
            inner: Arc::new(Inner { members, snapshot }),
        })
    }

    /// Handle on the member at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a member of this set.
    pub fn gauge(&self, index: usize) -> PublishedGauge {
        assert!(
            index < self.inner.members.len(),
            "gauge set has {} members, asked for {index}",
            self.inner.members.len()
        );
        PublishedGauge {
            set: self.clone(),
            index,
        }
    }

    /// Swap in one sample set per member, in member order, under a single write.
    /// Nothing changes if the count or any label set is wrong.
    pub fn replace(&self, samples: Vec<Vec<MetricSample>>) -> Result<(), ExporterError> {
        if samples.len() != self.inner.members.len() {
            return Err(ExporterError::GaugeCount {
                expected: self.inner.members.len(),
                got: samples.len(),
            });
        }
        for (member, set) in self.inner.members.iter().zip(&samples) {
            member.check(set)?;
        }
        *self.write() = samples;
        Ok(())
    }

    /// Drop every published series of every member.
    pub fn reset(&self) {
        self.write().iter_mut().for_each(Vec::clear);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Vec<MetricSample>>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Vec<MetricSample>>> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Collector for GaugeSet {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.members.iter().map(|m| &m.desc).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.read();
        self.inner
            .members
            .iter()
            .zip(snapshot.iter())
            .map(|(member, samples)| member.encode(samples))
            .collect()
    }
}

/// A single gauge family, either standalone or one member of a [`GaugeSet`].
#[derive(Clone)]
pub struct PublishedGauge {
    set: GaugeSet,
    index: usize,
}

impl PublishedGauge {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, ExporterError> {
        Ok(GaugeSet::new(&[(name, help, label_names)])?.gauge(0))
    }

    fn member(&self) -> &Member {
        &self.set.inner.members[self.index]
    }

    pub fn name(&self) -> &str {
        &self.member().desc.fq_name
    }

    /// Swap in a new sample set. Nothing changes if any sample has the wrong label names.
    pub fn replace(&self, samples: Vec<MetricSample>) -> Result<(), ExporterError> {
        self.member().check(&samples)?;
        self.set.write()[self.index] = samples;
        Ok(())
    }

    /// Drop every published series.
    pub fn reset(&self) {
        self.set.write()[self.index].clear();
    }

    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.set.read()[self.index].clone()
    }

    pub fn get(&self, labels: &Labels) -> Option<f64> {
        self.set.read()[self.index]
            .iter()
            .find(|s| &s.labels == labels)
            .map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.set.read()[self.index].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Collector for PublishedGauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.member().desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.set.read();
        vec![self.member().encode(&snapshot[self.index])]
    }
}
