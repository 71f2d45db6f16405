// Transport layer module
// Remote list API contract used by the collectors plus the PagerDuty REST
// client implementing it
//
// Numan Thabit 2025 Nov

pub mod pagerduty;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::errors::ExporterError;

pub use pagerduty::PagerDutyClient;

/// Query parameters shared by every list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: u32,
    pub offset: u32,
    /// Restrict results to these teams (`team_ids[]`)
    pub team_ids: Vec<String>,
    /// Only the earliest on-call entry per user, policy and level
    pub earliest: bool,
}

/// One page of a list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
    pub more: bool,
}

/// Reference to another API object; only the id is used.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ApiReference {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OnCall {
    pub user: ApiReference,
    /// Absent for on-calls reached directly through an escalation policy
    #[serde(default)]
    pub schedule: Option<ApiReference>,
    pub escalation_level: u32,
    /// Null for permanent on-calls
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub id: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub services: Vec<ApiReference>,
}

/// The list endpoints the collectors page through.
pub trait PagerDutyApi: Send + Sync {
    fn list_teams<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<Team>, ExporterError>>;

    fn list_oncalls<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<OnCall>, ExporterError>>;

    fn list_maintenance_windows<'a>(
        &'a self,
        opts: &'a ListOptions,
    ) -> BoxFuture<'a, Result<Page<MaintenanceWindow>, ExporterError>>;
}
