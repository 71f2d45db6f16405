// Configuration management module
// This file handles loading and validating exporter settings
// from environment variables
//
// Numan Thabit 2025 Nov

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Largest page size the PagerDuty list endpoints accept.
pub const PAGERDUTY_LIST_LIMIT: u32 = 100;

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// REST API token, sent as `Authorization: Token token=...`
    pub pagerduty_auth_token: String,
    /// API base, e.g. https://api.pagerduty.com
    pub pagerduty_api_url: Url,
    /// Comma separated team IDs restricting team-scoped list calls
    pub pagerduty_team_filter: Option<String>,
    /// Page size for every list call
    pub pagerduty_page_limit: u32,
    /// Idle connections kept per host by the HTTP client
    pub pagerduty_max_connections: usize,
    /// Skip the team collector entirely
    pub pagerduty_disable_teams: bool,
    pub pagerduty_http_timeout_seconds: u64,
    /// Interval for slowly changing families (teams)
    pub scrape_time_seconds: u64,
    /// Interval for live families (on-call, maintenance windows)
    pub scrape_time_live_seconds: u64,
    /// Bind address of the /metrics endpoint
    pub listen_addr: SocketAddr,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("pagerduty_auth_token", &"<redacted>")
            .field("pagerduty_api_url", &self.pagerduty_api_url.as_str())
            .field("pagerduty_team_filter", &self.pagerduty_team_filter)
            .field("pagerduty_page_limit", &self.pagerduty_page_limit)
            .field("pagerduty_max_connections", &self.pagerduty_max_connections)
            .field("pagerduty_disable_teams", &self.pagerduty_disable_teams)
            .field(
                "pagerduty_http_timeout_seconds",
                &self.pagerduty_http_timeout_seconds,
            )
            .field("scrape_time_seconds", &self.scrape_time_seconds)
            .field("scrape_time_live_seconds", &self.scrape_time_live_seconds)
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default().separator("__"))
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(
            config::Environment::default()
                .separator("__")
                .source(Some(vars.into_iter().collect())),
        )
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .set_default("pagerduty_api_url", "https://api.pagerduty.com")?
            .set_default("pagerduty_page_limit", i64::from(PAGERDUTY_LIST_LIMIT))?
            .set_default("pagerduty_max_connections", 4)?
            .set_default("pagerduty_disable_teams", false)?
            .set_default("pagerduty_http_timeout_seconds", 30)?
            .set_default("scrape_time_seconds", 300)?
            .set_default("scrape_time_live_seconds", 60)?
            .set_default("listen_addr", "0.0.0.0:8080")?
            .add_source(env)
            .build()
            .context("build configuration sources")?;
        let parsed: Self = cfg
            .try_deserialize()
            .context("deserialize exporter configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.pagerduty_auth_token.trim().is_empty(),
            "PAGERDUTY_AUTH_TOKEN must not be empty"
        );
        ensure!(
            (1..=PAGERDUTY_LIST_LIMIT).contains(&self.pagerduty_page_limit),
            "PAGERDUTY_PAGE_LIMIT must be between 1 and {PAGERDUTY_LIST_LIMIT}, got {}",
            self.pagerduty_page_limit
        );
        ensure!(
            self.scrape_time_seconds > 0 && self.scrape_time_live_seconds > 0,
            "scrape intervals must be greater than zero"
        );
        Ok(())
    }

    /// Team IDs from the comma separated filter, blanks dropped.
    pub fn team_ids(&self) -> Vec<String> {
        self.pagerduty_team_filter
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.pagerduty_http_timeout_seconds)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_time_seconds)
    }

    pub fn scrape_interval_live(&self) -> Duration {
        Duration::from_secs(self.scrape_time_live_seconds)
    }
}
