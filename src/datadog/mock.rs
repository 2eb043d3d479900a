//! In-memory metrics backend for tests.
//!
//! Submitted points are kept and served back to queries, so a run can be
//! replayed against the state a previous run left behind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;

use super::{ApiResponse, MetricMetadata, MetricsBackend, Point, SubmitOptions};
use crate::error::Result;

/// One accepted `emit_points` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub metric: String,
    pub points: Vec<Point>,
    pub options: SubmitOptions,
}

#[derive(Debug, Default)]
struct Inner {
    emitted: Vec<Emitted>,
    queries: Vec<String>,
    metadata: HashMap<String, MetricMetadata>,
    metadata_updates: Vec<(String, MetricMetadata)>,
    query_response: Option<ApiResponse>,
    reject_after: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Mutex<Inner>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query with `resp` instead of the stored points.
    pub fn set_query_response(&self, resp: ApiResponse) {
        self.inner.lock().query_response = Some(resp);
    }

    /// Accept `count` more submissions, then reject the rest.
    pub fn reject_after(&self, count: usize) {
        let mut inner = self.inner.lock();
        inner.reject_after = Some(inner.emitted.len() + count);
    }

    pub fn set_metadata(&self, metric: &str, metadata: MetricMetadata) {
        self.inner.lock().metadata.insert(metric.to_owned(), metadata);
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.inner.lock().emitted.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.inner.lock().queries.clone()
    }

    pub fn metadata_updates(&self) -> Vec<(String, MetricMetadata)> {
        self.inner.lock().metadata_updates.clone()
    }
}

/// Splits `metric{key:value}` into the metric and its scope tag.
fn parse_query(query: &str) -> (&str, Option<&str>) {
    match query.split_once('{') {
        Some((metric, scope)) => (metric, Some(scope.trim_end_matches('}'))),
        None => (query, None),
    }
}

#[async_trait]
impl MetricsBackend for MockBackend {
    async fn get_points(
        &self,
        query: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ApiResponse> {
        let mut inner = self.inner.lock();
        inner.queries.push(query.to_owned());
        if let Some(resp) = &inner.query_response {
            return Ok(resp.clone());
        }

        let (metric, scope) = parse_query(query);
        let pointlist: Vec<_> = inner
            .emitted
            .iter()
            .filter(|e| e.metric == metric)
            .filter(|e| scope.map_or(true, |tag| e.options.tags.iter().any(|t| t == tag)))
            .flat_map(|e| e.points.iter().copied())
            .filter(|(ts, _)| (from.timestamp()..=to.timestamp()).contains(ts))
            .map(|(ts, value)| json!([ts as f64 * 1000.0, value]))
            .collect();

        let series = if pointlist.is_empty() {
            json!([])
        } else {
            json!([{ "metric": metric, "pointlist": pointlist }])
        };
        Ok(ApiResponse::new(
            200,
            json!({"status": "ok", "res_type": "time_series", "series": series}),
        ))
    }

    async fn emit_points(
        &self,
        metric: &str,
        points: &[Point],
        options: &SubmitOptions,
    ) -> Result<ApiResponse> {
        let mut inner = self.inner.lock();
        if inner.reject_after.is_some_and(|limit| inner.emitted.len() >= limit) {
            return Ok(ApiResponse::new(400, json!({"errors": ["rejected"]})));
        }
        inner.emitted.push(Emitted {
            metric: metric.to_owned(),
            points: points.to_vec(),
            options: options.clone(),
        });
        Ok(ApiResponse::new(202, json!({"status": "ok"})))
    }

    async fn get_metadata(&self, metric: &str) -> Result<ApiResponse> {
        let inner = self.inner.lock();
        Ok(match inner.metadata.get(metric) {
            Some(metadata) => ApiResponse::new(200, json!(metadata)),
            None => ApiResponse::new(404, json!({"errors": ["Metric not found"]})),
        })
    }

    async fn update_metadata(
        &self,
        metric: &str,
        metadata: &MetricMetadata,
    ) -> Result<ApiResponse> {
        let mut inner = self.inner.lock();
        inner
            .metadata_updates
            .push((metric.to_owned(), metadata.clone()));
        inner.metadata.insert(metric.to_owned(), metadata.clone());
        Ok(ApiResponse::new(200, json!(metadata)))
    }
}
