//! Metrics backend seam.
//!
//! The backend is reached through [`MetricsBackend`], whose calls mirror the
//! four Datadog v1 endpoints this tool uses. Each call hands back the raw
//! `(status, body)` pair; deciding whether that means success is left to the
//! caller through [`status_or_error`].

pub mod checkpoint;
pub mod client;
pub mod metadata;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use checkpoint::Checkpoint;
pub use client::DatadogClient;
pub use metadata::MetadataSync;

// ─── Wire types ──────────────────────────────────────────────────

/// HTTP status plus the decoded JSON body (a JSON string when the body was
/// not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `[unix_seconds, value]`.
pub type Point = (i64, f64);

/// Everything about a submission besides the metric name and points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub interval: u64,
    pub host: String,
    /// `key:value` strings.
    pub tags: Vec<String>,
}

/// Descriptive metadata registered for one metric series.
///
/// Compared by full equality: any field differing means the backend's copy
/// is stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Read-only on the backend side; never sent when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statsd_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_unit: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// The `{"series": [{"pointlist": [[ms, value], ..]}]}` part of a query reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub pointlist: Vec<(f64, Option<f64>)>,
}

// ─── Backend ─────────────────────────────────────────────────────

#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Points matching `query` between `from` and `to`.
    async fn get_points(
        &self,
        query: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ApiResponse>;

    async fn emit_points(
        &self,
        metric: &str,
        points: &[Point],
        options: &SubmitOptions,
    ) -> Result<ApiResponse>;

    async fn get_metadata(&self, metric: &str) -> Result<ApiResponse>;

    async fn update_metadata(&self, metric: &str, metadata: &MetricMetadata)
        -> Result<ApiResponse>;
}

// ─── Status interpretation ───────────────────────────────────────

/// What a backend reply says about itself.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    /// The body's `status` field.
    Status(String),
    /// The body's `errors` field.
    Errors(Vec<String>),
    /// Neither field present.
    Unrecognized(ApiResponse),
}

impl BackendStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Status(s) if s == "ok")
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(s) => write!(f, "status {s}"),
            Self::Errors(errors) => write!(f, "errors: {}", errors.join("; ")),
            Self::Unrecognized(resp) => write!(f, "HTTP {} {}", resp.status, resp.body),
        }
    }
}

pub fn status_or_error(resp: &ApiResponse) -> BackendStatus {
    if let Some(status) = resp.body.get("status") {
        return BackendStatus::Status(match status {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    if let Some(errors) = resp.body.get("errors") {
        let errors = match errors {
            Value::Array(items) => items
                .iter()
                .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_owned))
                .collect(),
            other => vec![other.to_string()],
        };
        return BackendStatus::Errors(errors);
    }
    BackendStatus::Unrecognized(resp.clone())
}
