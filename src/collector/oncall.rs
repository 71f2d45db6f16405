// On-call collector
// Publishes the start and end time of every current on-call assignment
//
// Numan Thabit 2025 Nov

use futures::future::BoxFuture;
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::metric_list::parse_timestamp;
use super::{
    labels, paginate, Collector, Completion, MetricList, PageStats, PublishedGauge,
};
use crate::errors::ExporterError;
use crate::metrics::ApiCounter;
use crate::transport::{ListOptions, OnCall, PagerDutyApi};

pub struct OnCallCollector {
    api: Arc<dyn PagerDutyApi>,
    counter: ApiCounter,
    page_limit: u32,
    schedule_oncall: PublishedGauge,
}

impl OnCallCollector {
    pub fn new(
        api: Arc<dyn PagerDutyApi>,
        counter: ApiCounter,
        page_limit: u32,
    ) -> Result<Self, ExporterError> {
        let schedule_oncall = PublishedGauge::new(
            "pagerduty_schedule_oncall",
            "PagerDuty schedule oncall",
            &["scheduleID", "userID", "escalationLevel", "type"],
        )?;
        Ok(Self {
            api,
            counter,
            page_limit,
            schedule_oncall,
        })
    }

    pub fn schedule_oncall(&self) -> &PublishedGauge {
        &self.schedule_oncall
    }
}

fn record_oncall(list: &mut MetricList, oncall: OnCall) {
    let schedule_id = oncall.schedule.map(|s| s.id).unwrap_or_default();
    let level = oncall.escalation_level.to_string();
    let row = |kind: &str| {
        labels([
            ("scheduleID", schedule_id.as_str()),
            ("userID", oncall.user.id.as_str()),
            ("escalationLevel", level.as_str()),
            ("type", kind),
        ])
    };

    list.add_time(row("startTime"), parse_timestamp(oncall.start.as_deref()));
    list.add_time(row("endTime"), parse_timestamp(oncall.end.as_deref()));
}

impl Collector for OnCallCollector {
    fn name(&self) -> &'static str {
        "oncall"
    }

    fn setup(&self, registry: &Registry) -> Result<(), ExporterError> {
        registry.register(Box::new(self.schedule_oncall.clone()))?;
        Ok(())
    }

    fn reset(&self) {
        self.schedule_oncall.reset();
    }

    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        completion: &'a Completion,
    ) -> BoxFuture<'a, Result<PageStats, ExporterError>> {
        Box::pin(async move {
            let opts = ListOptions {
                limit: self.page_limit,
                earliest: true,
                ..ListOptions::default()
            };
            let api = &self.api;
            let mut oncalls = MetricList::new();

            let stats = paginate(
                "ListOnCalls",
                &opts,
                &self.counter,
                cancel,
                move |o: ListOptions| async move { api.list_oncalls(&o).await },
                |oncall: OnCall| record_oncall(&mut oncalls, oncall),
            )
            .await?;

            info!(
                collector = self.name(),
                pages = stats.pages,
                entries = stats.items,
                series = oncalls.len(),
                "oncall collection finished"
            );

            let gauge = self.schedule_oncall.clone();
            completion.publish(move || oncalls.gauge_set(&gauge))?;
            Ok(stats)
        })
    }
}
