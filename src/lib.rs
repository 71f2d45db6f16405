// Library root module for pagerduty-exporter
// This file defines the public API and module structure for the exporter
// library used by the binary and the integration tests
//
// Numan Thabit 2025 Nov

pub mod collector;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod transport;
