// Error types and error handling module
// This file defines the error types raised by the collection pipeline
// for the pagerduty-exporter project
//
// Numan Thabit 2025 Nov

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{operation} failed with http {status}")]
    Http { operation: String, status: u16 },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("collection cancelled")]
    Cancelled,
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("sample for {family} has labels {got:?}, expected {expected:?}")]
    LabelMismatch {
        family: String,
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("gauge set has {expected} members, got {got} sample sets")]
    GaugeCount { expected: usize, got: usize },
}
