// Collector scheduler
//
// Runs every registered collector on its own interval and funnels all
// completed cycles through a single publisher task, so gauge swaps never
// interleave with each other.
//
// Numan Thabit 2025 Nov

use anyhow::{Context, Result};
use futures::future::join_all;
use prometheus::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::{
    Collector, CollectorState, Completion, CycleState, PageStats, Publication,
};
use crate::errors::ExporterError;
use crate::metrics::CollectorTelemetry;

struct Family {
    collector: Arc<dyn Collector>,
    interval: Duration,
    state: Arc<CycleState>,
}

pub struct Scheduler {
    families: Vec<Family>,
    telemetry: CollectorTelemetry,
}

impl Scheduler {
    pub fn new(telemetry: CollectorTelemetry) -> Self {
        Self {
            families: Vec::new(),
            telemetry,
        }
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>, interval: Duration) {
        info!(
            collector = collector.name(),
            interval_secs = interval.as_secs(),
            "collector registered"
        );
        self.families.push(Family {
            collector,
            interval,
            state: Arc::default(),
        });
    }

    /// Register every collector's gauges into `registry`.
    pub fn setup(&self, registry: &Registry) -> Result<()> {
        for family in &self.families {
            family
                .collector
                .setup(registry)
                .with_context(|| format!("register {} gauges", family.collector.name()))?;
        }
        Ok(())
    }

    pub fn state(&self, collector: &str) -> Option<CollectorState> {
        self.families
            .iter()
            .find(|f| f.collector.name() == collector)
            .map(|f| f.state.get())
    }

    /// Run one cycle of every family concurrently, then publish serially.
    pub async fn run_once(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<(&'static str, Result<PageStats, ExporterError>)> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cycles = self.families.iter().map(|family| {
            let completion =
                Completion::with_state(family.collector.name(), family.state.clone(), tx.clone());
            let telemetry = &self.telemetry;
            async move {
                let result = run_cycle(family, &completion, cancel, telemetry).await;
                (family.collector.name(), result)
            }
        });
        let results = join_all(cycles).await;
        drop(tx);

        while let Some(publication) = rx.recv().await {
            publish(publication);
        }
        results
    }

    /// Run every family on its interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let publisher = tokio::spawn(publish_loop(rx));

        let mut handles = Vec::with_capacity(self.families.len());
        for family in self.families {
            let completion =
                Completion::with_state(family.collector.name(), family.state.clone(), tx.clone());
            let cancel = cancel.clone();
            let telemetry = self.telemetry.clone();
            handles.push(tokio::spawn(async move {
                family_loop(family, completion, cancel, telemetry).await
            }));
        }
        drop(tx);

        for handle in handles {
            handle.await.context("collector task panicked")?;
        }
        publisher.await.context("publisher task panicked")?;
        info!("scheduler stopped");
        Ok(())
    }
}

async fn family_loop(
    family: Family,
    completion: Completion,
    cancel: CancellationToken,
    telemetry: CollectorTelemetry,
) {
    let mut ticker = tokio::time::interval(family.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // failures are logged and counted inside run_cycle
                let _ = run_cycle(&family, &completion, &cancel, &telemetry).await;
            }
        }
    }
    debug!(collector = family.collector.name(), "collector loop stopped");
}

/// One reset/collect pass. A failed pass publishes nothing and schedules a
/// reset of the family's gauges before the next attempt.
async fn run_cycle(
    family: &Family,
    completion: &Completion,
    cancel: &CancellationToken,
    telemetry: &CollectorTelemetry,
) -> Result<PageStats, ExporterError> {
    let name = family.collector.name();

    if family.state.take_reset() {
        family.state.set(CollectorState::Resetting);
        family.collector.reset();
        debug!(collector = name, "cleared stale series");
    }

    family.state.set(CollectorState::Collecting);
    let started = Instant::now();
    match family.collector.collect(cancel, completion).await {
        Ok(stats) => {
            telemetry.observe_duration(name, started.elapsed().as_secs_f64());
            Ok(stats)
        }
        Err(ExporterError::Cancelled) => {
            warn!(collector = name, "collection cancelled; nothing published");
            family.state.set(CollectorState::Idle);
            family.state.mark_stale();
            telemetry.record_error(name);
            Err(ExporterError::Cancelled)
        }
        Err(err) => {
            error!(collector = name, error = %err, "collection failed; nothing published");
            family.state.set(CollectorState::Idle);
            family.state.mark_stale();
            telemetry.record_error(name);
            Err(err)
        }
    }
}

async fn publish_loop(mut rx: mpsc::UnboundedReceiver<Publication>) {
    while let Some(publication) = rx.recv().await {
        publish(publication);
    }
    debug!("publisher drained");
}

fn publish(publication: Publication) {
    let collector = publication.collector;
    match publication.apply() {
        Ok(()) => debug!(collector = collector, "published snapshot"),
        Err(err) => error!(collector = collector, error = %err, "publishing snapshot failed"),
    }
}
