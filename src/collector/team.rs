// Team collector
// Publishes one info row per PagerDuty team
//
// Numan Thabit 2025 Nov

use futures::future::BoxFuture;
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    labels, paginate, Collector, Completion, MetricList, PageStats, PublishedGauge,
};
use crate::errors::ExporterError;
use crate::metrics::ApiCounter;
use crate::transport::{ListOptions, PagerDutyApi, Team};

pub struct TeamCollector {
    api: Arc<dyn PagerDutyApi>,
    counter: ApiCounter,
    page_limit: u32,
    team_info: PublishedGauge,
}

impl TeamCollector {
    pub fn new(
        api: Arc<dyn PagerDutyApi>,
        counter: ApiCounter,
        page_limit: u32,
    ) -> Result<Self, ExporterError> {
        let team_info = PublishedGauge::new(
            "pagerduty_team_info",
            "PagerDuty team",
            &["teamID", "teamName", "teamUrl"],
        )?;
        Ok(Self {
            api,
            counter,
            page_limit,
            team_info,
        })
    }

    pub fn team_info(&self) -> &PublishedGauge {
        &self.team_info
    }
}

impl Collector for TeamCollector {
    fn name(&self) -> &'static str {
        "team"
    }

    fn setup(&self, registry: &Registry) -> Result<(), ExporterError> {
        registry.register(Box::new(self.team_info.clone()))?;
        Ok(())
    }

    fn reset(&self) {
        self.team_info.reset();
    }

    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        completion: &'a Completion,
    ) -> BoxFuture<'a, Result<PageStats, ExporterError>> {
        Box::pin(async move {
            let opts = ListOptions {
                limit: self.page_limit,
                ..ListOptions::default()
            };
            let api = &self.api;
            let mut teams = MetricList::new();

            let stats = paginate(
                "ListTeams",
                &opts,
                &self.counter,
                cancel,
                move |o: ListOptions| async move { api.list_teams(&o).await },
                |team: Team| {
                    teams.add_info(labels([
                        ("teamID", team.id),
                        ("teamName", team.name),
                        ("teamUrl", team.html_url),
                    ]))
                },
            )
            .await?;

            info!(
                collector = self.name(),
                pages = stats.pages,
                teams = teams.len(),
                "team collection finished"
            );

            let gauge = self.team_info.clone();
            completion.publish(move || teams.gauge_set(&gauge))?;
            Ok(stats)
        })
    }
}
