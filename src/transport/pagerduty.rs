// PagerDuty REST API client
// This file implements the offset-paginated list calls used by the collectors
// against the PagerDuty REST API v2
//
// Numan Thabit 2025 Nov

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ListOptions, MaintenanceWindow, OnCall, Page, PagerDutyApi, Team};
use crate::errors::ExporterError;

const PAGERDUTY_ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

#[derive(Debug, Clone)]
pub struct PagerDutyClient {
    http: Client,
    base: Url,
}

impl PagerDutyClient {
    pub fn new(
        base: Url,
        auth_token: &str,
        timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token token={auth_token}"))
            .context("auth token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(PAGERDUTY_ACCEPT));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .gzip(true)
            .build()
            .context("build HTTP client for PagerDuty API")?;

        Ok(Self {
            http,
            base: with_trailing_slash(base),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.base.as_str()
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        items_key: &str,
        opts: &ListOptions,
    ) -> Result<Page<T>, ExporterError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ExporterError::Transport(format!("{operation} url: {e}")))?;

        let resp = self
            .http
            .get(url)
            .query(&query_pairs(opts))
            .send()
            .await
            .map_err(|e| ExporterError::Transport(format!("{operation} send: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExporterError::Http {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body: Value = resp
            .json()
            .await
            .map_err(|e| ExporterError::Decode(format!("{operation} json parse: {e}")))?;
        let page = decode_page(&mut body, items_key, opts)
            .map_err(|e| ExporterError::Decode(format!("{operation}: {e}")))?;

        debug!(
            operation = operation,
            offset = page.offset,
            items = page.items.len(),
            more = page.more,
            "received page"
        );
        Ok(page)
    }
}

impl PagerDutyApi for PagerDutyClient {
    fn list_teams<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<Team>, ExporterError>> {
        Box::pin(self.get_page("ListTeams", "teams", "teams", opts))
    }

    fn list_oncalls<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<OnCall>, ExporterError>> {
        Box::pin(self.get_page("ListOnCalls", "oncalls", "oncalls", opts))
    }

    fn list_maintenance_windows<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<MaintenanceWindow>, ExporterError>> {
        Box::pin(self.get_page(
            "ListMaintenanceWindows",
            "maintenance_windows",
            "maintenance_windows",
            opts,
        ))
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn query_pairs(opts: &ListOptions) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("limit", opts.limit.to_string()),
        ("offset", opts.offset.to_string()),
    ];
    pairs.extend(opts.team_ids.iter().map(|id| ("team_ids[]", id.clone())));
    if opts.earliest {
        pairs.push(("earliest", "true".to_string()));
    }
    pairs
}

fn decode_page<T: DeserializeOwned>(
    body: &mut Value,
    items_key: &str,
    opts: &ListOptions,
) -> Result<Page<T>, String> {
    let items = body
        .get_mut(items_key)
        .map(Value::take)
        .ok_or_else(|| format!("missing `{items_key}` in response"))?;
    let items: Vec<T> = serde_json::from_value(items).map_err(|e| e.to_string())?;
    let number = |key: &str, fallback: u32| {
        body.get(key)
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(fallback)
    };
    Ok(Page {
        limit: number("limit", opts.limit),
        offset: number("offset", opts.offset),
        more: body.get("more").and_then(Value::as_bool).unwrap_or(false),
        items,
    })
}
