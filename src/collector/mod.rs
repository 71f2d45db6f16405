// Collector module - per metric family collection pipeline
// Each collector pages through one PagerDuty list endpoint, accumulates the
// samples for its gauges and hands a publish closure back to the scheduler
//
// Numan Thabit 2025 Nov

pub mod gauge;
pub mod maintenance_window;
pub mod metric_list;
pub mod oncall;
pub mod pagination;
pub mod team;

use futures::future::BoxFuture;
use prometheus::Registry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::ExporterError;

pub use gauge::{GaugeSet, PublishedGauge};
pub use maintenance_window::MaintenanceWindowCollector;
pub use metric_list::{labels, Labels, MetricList, MetricSample};
pub use oncall::OnCallCollector;
pub use pagination::{paginate, PageStats};
pub use team::TeamCollector;

/// Deferred gauge swap produced by a completed collection cycle.
pub type PublishFn = Box<dyn FnOnce() -> Result<(), ExporterError> + Send>;

/// Lifecycle of one family's collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Resetting,
    Collecting,
    Publishing,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollectorState::Idle => "idle",
            CollectorState::Resetting => "resetting",
            CollectorState::Collecting => "collecting",
            CollectorState::Publishing => "publishing",
        };
        f.write_str(s)
    }
}

/// Shared view of one family's cycle, updated by the scheduler and the publisher.
#[derive(Debug)]
pub struct CycleState {
    state: Mutex<CollectorState>,
    needs_reset: AtomicBool,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            state: Mutex::new(CollectorState::Idle),
            needs_reset: AtomicBool::new(false),
        }
    }
}

impl CycleState {
    pub fn get(&self) -> CollectorState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, next: CollectorState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    /// Ask for the published series to be cleared before the next cycle.
    pub fn mark_stale(&self) {
        self.needs_reset.store(true, Ordering::SeqCst);
    }

    /// Consume a pending reset request.
    pub fn take_reset(&self) -> bool {
        self.needs_reset.swap(false, Ordering::SeqCst)
    }
}

/// A publish closure tagged with the family that produced it.
pub struct Publication {
    pub collector: &'static str,
    pub state: Arc<CycleState>,
    pub swap: PublishFn,
}

impl Publication {
    /// Run the swap and return the family to idle.
    pub fn apply(self) -> Result<(), ExporterError> {
        let result = (self.swap)();
        if result.is_err() {
            self.state.mark_stale();
        }
        self.state.set(CollectorState::Idle);
        result
    }
}

/// Sending half of the completion channel handed to [`Collector::collect`].
#[derive(Clone)]
pub struct Completion {
    collector: &'static str,
    state: Arc<CycleState>,
    tx: mpsc::UnboundedSender<Publication>,
}

impl Completion {
    pub fn new(collector: &'static str, tx: mpsc::UnboundedSender<Publication>) -> Self {
        Self::with_state(collector, Arc::default(), tx)
    }

    pub fn with_state(
        collector: &'static str,
        state: Arc<CycleState>,
        tx: mpsc::UnboundedSender<Publication>,
    ) -> Self {
        Self {
            collector,
            state,
            tx,
        }
    }

    /// Queue `apply` for the publisher. Fails only when the publisher has shut down.
    pub fn publish<F>(&self, apply: F) -> Result<(), ExporterError>
    where
        F: FnOnce() -> Result<(), ExporterError> + Send + 'static,
    {
        self.state.set(CollectorState::Publishing);
        self.tx
            .send(Publication {
                collector: self.collector,
                state: self.state.clone(),
                swap: Box::new(apply),
            })
            .map_err(|_| {
                self.state.set(CollectorState::Idle);
                ExporterError::Cancelled
            })
    }
}

pub trait Collector: Send + Sync {
    /// Stable family name used in logs and self-metrics.
    fn name(&self) -> &'static str;

    /// Register this family's gauges.
    fn setup(&self, registry: &Registry) -> Result<(), ExporterError>;

    /// Clear all published series of this family.
    fn reset(&self);

    /// Run one full collection cycle. On success exactly one publication has
    /// been queued on `completion`; on error nothing has been.
    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        completion: &'a Completion,
    ) -> BoxFuture<'a, Result<PageStats, ExporterError>>;
}
