// Maintenance window collector
// Publishes current and upcoming maintenance windows per affected service;
// windows that already ended are skipped
//
// Numan Thabit 2025 Nov

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::metric_list::parse_timestamp;
use super::{
    labels, paginate, Collector, Completion, GaugeSet, MetricList, PageStats, PublishedGauge,
};
use crate::errors::ExporterError;
use crate::metrics::ApiCounter;
use crate::transport::{ListOptions, MaintenanceWindow, PagerDutyApi};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct MaintenanceWindowCollector {
    api: Arc<dyn PagerDutyApi>,
    counter: ApiCounter,
    page_limit: u32,
    team_ids: Vec<String>,
    clock: Clock,
    windows: GaugeSet,
    window_info: PublishedGauge,
    window_status: PublishedGauge,
}

impl MaintenanceWindowCollector {
    pub fn new(
        api: Arc<dyn PagerDutyApi>,
        counter: ApiCounter,
        page_limit: u32,
        team_ids: Vec<String>,
    ) -> Result<Self, ExporterError> {
        // info and status are swapped and scraped together
        let windows = GaugeSet::new(&[
            (
                "pagerduty_maintenancewindow_info",
                "PagerDuty MaintenanceWindow",
                &["windowID", "serviceID"][..],
            ),
            (
                "pagerduty_maintenancewindow_status",
                "PagerDuty MaintenanceWindow",
                &["windowID", "serviceID", "type"][..],
            ),
        ])?;
        Ok(Self {
            api,
            counter,
            page_limit,
            team_ids,
            clock: Arc::new(Utc::now),
            window_info: windows.gauge(0),
            window_status: windows.gauge(1),
            windows,
        })
    }

    /// Replace the wall clock used for the expiry check.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn window_info(&self) -> &PublishedGauge {
        &self.window_info
    }

    pub fn window_status(&self) -> &PublishedGauge {
        &self.window_status
    }
}

/// Windows accumulated during one cycle.
struct WindowRows {
    now: DateTime<Utc>,
    info: MetricList,
    status: MetricList,
    expired: u32,
}

impl WindowRows {
    fn record(&mut self, window: MaintenanceWindow) {
        let start = parse_timestamp(window.start_time.as_deref());
        let end = parse_timestamp(window.end_time.as_deref());

        // an unparseable end counts as already over
        match end {
            Some(end) if end >= self.now => {}
            _ => {
                debug!(window = %window.id, end = ?window.end_time, "skipping expired maintenance window");
                self.expired += 1;
                return;
            }
        }

        for service in &window.services {
            self.info.add_info(labels([
                ("windowID", window.id.as_str()),
                ("serviceID", service.id.as_str()),
            ]));
            self.status.add_time(
                labels([
                    ("windowID", window.id.as_str()),
                    ("serviceID", service.id.as_str()),
                    ("type", "startTime"),
                ]),
                start,
            );
            self.status.add_time(
                labels([
                    ("windowID", window.id.as_str()),
                    ("serviceID", service.id.as_str()),
                    ("type", "endTime"),
                ]),
                end,
            );
        }
    }
}

impl Collector for MaintenanceWindowCollector {
    fn name(&self) -> &'static str {
        "maintenance_window"
    }

    fn setup(&self, registry: &Registry) -> Result<(), ExporterError> {
        registry.register(Box::new(self.windows.clone()))?;
        Ok(())
    }

    fn reset(&self) {
        self.windows.reset();
    }

    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        completion: &'a Completion,
    ) -> BoxFuture<'a, Result<PageStats, ExporterError>> {
        Box::pin(async move {
            let opts = ListOptions {
                limit: self.page_limit,
                team_ids: self.team_ids.clone(),
                ..ListOptions::default()
            };
            let api = &self.api;
            let mut rows = WindowRows {
                now: (self.clock)(),
                info: MetricList::new(),
                status: MetricList::new(),
                expired: 0,
            };

            let stats = paginate(
                "ListMaintenanceWindows",
                &opts,
                &self.counter,
                cancel,
                move |o: ListOptions| async move { api.list_maintenance_windows(&o).await },
                |window: MaintenanceWindow| rows.record(window),
            )
            .await?;

            info!(
                collector = self.name(),
                pages = stats.pages,
                windows = stats.items,
                expired = rows.expired,
                "maintenance window collection finished"
            );

            let windows = self.windows.clone();
            let WindowRows { info, status, .. } = rows;
            completion.publish(move || {
                windows.replace(vec![info.into_samples(), status.into_samples()])
            })?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{run_cycle, MockApi};
    use crate::transport::ApiReference;
    use pretty_assertions::assert_eq;

    const NOW: &str = "2024-06-01T12:00:00Z";

    fn now() -> DateTime<Utc> {
        parse_timestamp(Some(NOW)).unwrap()
    }

    fn window(id: &str, start: &str, end: &str, services: &[&str]) -> MaintenanceWindow {
        MaintenanceWindow {
            id: id.into(),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            services: services
                .iter()
                .map(|s| ApiReference { id: s.to_string() })
                .collect(),
        }
    }

    fn collector(windows: Vec<MaintenanceWindow>) -> (MaintenanceWindowCollector, Arc<MockApi>) {
        let api = Arc::new(MockApi {
            windows,
            ..MockApi::default()
        });
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let collector = MaintenanceWindowCollector::new(api.clone(), counter, 100, Vec::new())
            .unwrap()
            .with_clock(now);
        (collector, api)
    }

    #[tokio::test]
    async fn expired_window_produces_no_samples() {
        let (collector, _) = collector(vec![window(
            "PW1",
            "2024-06-01T08:00:00Z",
            "2024-06-01T11:59:59Z",
            &["PS1", "PS2"],
        )]);
        run_cycle(&collector).await.unwrap();
        assert!(collector.window_info().is_empty());
        assert!(collector.window_status().is_empty());
    }

    #[tokio::test]
    async fn window_ending_exactly_now_is_still_reported() {
        let (collector, _) = collector(vec![window(
            "PW1",
            "2024-06-01T08:00:00Z",
            NOW,
            &["PS1"],
        )]);
        run_cycle(&collector).await.unwrap();
        assert_eq!(collector.window_info().len(), 1);
        assert_eq!(
            collector.window_status().get(&labels([
                ("windowID", "PW1"),
                ("serviceID", "PS1"),
                ("type", "endTime"),
            ])),
            Some(now().timestamp() as f64)
        );
    }

    #[tokio::test]
    async fn active_window_emits_info_and_status_per_service() {
        let (collector, _) = collector(vec![
            window(
                "PW1",
                "2024-06-01T10:00:00Z",
                "2024-06-01T14:00:00Z",
                &["PS1", "PS2"],
            ),
            window(
                "PW0",
                "2024-05-01T10:00:00Z",
                "2024-05-01T14:00:00Z",
                &["PS9"],
            ),
        ]);
        run_cycle(&collector).await.unwrap();

        let info = collector.window_info();
        assert_eq!(info.len(), 2);
        assert_eq!(
            info.get(&labels([("windowID", "PW1"), ("serviceID", "PS2")])),
            Some(1.0)
        );

        let status = collector.window_status();
        assert_eq!(status.len(), 4);
        let start = status.get(&labels([
            ("windowID", "PW1"),
            ("serviceID", "PS1"),
            ("type", "startTime"),
        ]));
        assert_eq!(start, Some(1_717_236_000.0));
        // status rows are keyed by the window, not the service
        assert!(status
            .snapshot()
            .iter()
            .all(|s| s.labels["windowID"] == "PW1"));
    }

    #[tokio::test]
    async fn unparseable_end_time_counts_as_expired() {
        let (collector, _) = collector(vec![window(
            "PW1",
            "2024-06-01T10:00:00Z",
            "soon",
            &["PS1"],
        )]);
        run_cycle(&collector).await.unwrap();
        assert!(collector.window_info().is_empty());
    }

    #[tokio::test]
    async fn bad_start_time_is_clamped_to_sentinel() {
        let (collector, _) = collector(vec![window(
            "PW1",
            "garbage",
            "2024-06-02T00:00:00Z",
            &["PS1"],
        )]);
        run_cycle(&collector).await.unwrap();
        assert_eq!(
            collector.window_status().get(&labels([
                ("windowID", "PW1"),
                ("serviceID", "PS1"),
                ("type", "startTime"),
            ])),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn team_filter_is_sent_with_every_page() {
        let windows = (0..3)
            .map(|i| {
                window(
                    &format!("PW{i}"),
                    "2024-06-01T10:00:00Z",
                    "2024-06-02T10:00:00Z",
                    &["PS1"],
                )
            })
            .collect();
        let api = Arc::new(MockApi {
            windows,
            ..MockApi::default()
        });
        let counter = ApiCounter::new(&Registry::new()).unwrap();
        let collector =
            MaintenanceWindowCollector::new(api.clone(), counter.clone(), 2, vec!["PT1".into()])
                .unwrap()
                .with_clock(now);

        run_cycle(&collector).await.unwrap();
        let requests = api.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|o| o.team_ids == ["PT1"]));
        assert_eq!(counter.get("ListMaintenanceWindows"), 2);
        assert_eq!(collector.window_info().len(), 3);
    }

    #[tokio::test]
    async fn info_and_status_are_rendered_from_the_same_cycle() {
        let api = Arc::new(MockApi {
            windows: vec![window(
                "PW1",
                "2024-06-01T10:00:00Z",
                "2024-06-02T10:00:00Z",
                &["PS1"],
            )],
            ..MockApi::default()
        });
        let registry = Registry::new();
        let counter = ApiCounter::new(&registry).unwrap();
        let collector = MaintenanceWindowCollector::new(api, counter, 100, Vec::new())
            .unwrap()
            .with_clock(now);
        collector.setup(&registry).unwrap();
        run_cycle(&collector).await.unwrap();

        let text = crate::metrics::render(&registry).unwrap();
        assert!(text.contains(r#"pagerduty_maintenancewindow_info{serviceID="PS1",windowID="PW1"} 1"#));
        assert!(text.contains(
            r#"pagerduty_maintenancewindow_status{serviceID="PS1",type="endTime",windowID="PW1"} 1717322400"#
        ));

        collector.reset();
        assert!(collector.window_info().is_empty());
        assert!(collector.window_status().is_empty());
    }

    #[tokio::test]
    async fn cancelled_cycle_publishes_nothing() {
        let (collector, api) = collector(vec![window(
            "PW1",
            "2024-06-01T10:00:00Z",
            "2024-06-02T10:00:00Z",
            &["PS1"],
        )]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let completion = Completion::new(collector.name(), tx);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = collector.collect(&cancel, &completion).await.unwrap_err();
        assert!(matches!(err, ExporterError::Cancelled));
        assert!(rx.try_recv().is_err());
        assert!(api.offsets().is_empty());
    }
}
