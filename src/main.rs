use anyhow::{anyhow, Context, Result};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pagerduty_exporter::collector::{
    MaintenanceWindowCollector, OnCallCollector, TeamCollector,
};
use pagerduty_exporter::config::AppConfig;
use pagerduty_exporter::metrics::{ApiCounter, CollectorTelemetry};
use pagerduty_exporter::scheduler::Scheduler;
use pagerduty_exporter::server::create_metrics_router;
use pagerduty_exporter::transport::{PagerDutyApi, PagerDutyClient};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal exporter error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;

    let client = PagerDutyClient::new(
        config.pagerduty_api_url.clone(),
        &config.pagerduty_auth_token,
        config.http_timeout(),
        config.pagerduty_max_connections,
    )
    .context("initialize PagerDuty client")?;
    let api_endpoint = client.endpoint().to_string();
    let api: Arc<dyn PagerDutyApi> = Arc::new(client);

    let registry = Registry::new();
    let counter = ApiCounter::new(&registry).context("register api counter")?;
    let telemetry = CollectorTelemetry::new(&registry).context("register collector telemetry")?;

    let team_ids = config.team_ids();
    let mut scheduler = Scheduler::new(telemetry);

    if config.pagerduty_disable_teams {
        warn!("team collector disabled by configuration");
    } else {
        let teams = TeamCollector::new(api.clone(), counter.clone(), config.pagerduty_page_limit)?;
        scheduler.register(Arc::new(teams), config.scrape_interval());
    }

    let oncall = OnCallCollector::new(api.clone(), counter.clone(), config.pagerduty_page_limit)?;
    scheduler.register(Arc::new(oncall), config.scrape_interval_live());

    let windows = MaintenanceWindowCollector::new(
        api.clone(),
        counter.clone(),
        config.pagerduty_page_limit,
        team_ids.clone(),
    )?;
    scheduler.register(Arc::new(windows), config.scrape_interval_live());

    scheduler
        .setup(&registry)
        .context("register collector gauges")?;

    info!(
        api = %api_endpoint,
        listen = %config.listen_addr,
        teams = ?team_ids,
        page_limit = config.pagerduty_page_limit,
        "PagerDuty exporter online"
    );

    let cancel = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind metrics listener {}", config.listen_addr))?;
    let app = create_metrics_router(registry);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "ctrl_c listener error");
            }
            info!("Shutdown signal received, exiting");
            shutdown.cancel();
        })
        .await
        .context("metrics server error")?;

    cancel.cancel();
    scheduler_handle
        .await
        .context("scheduler task panicked")??;
    Ok(())
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
