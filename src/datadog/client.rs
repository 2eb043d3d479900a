use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiResponse, MetricMetadata, MetricsBackend, Point, SubmitOptions};
use crate::error::Result;

pub const DEFAULT_API_URL: &str = "https://api.datadoghq.com";

/// Datadog v1 HTTP API client.
pub struct DatadogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl fmt::Debug for DatadogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatadogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SeriesPayload<'a> {
    series: [SeriesItem<'a>; 1],
}

#[derive(Serialize)]
struct SeriesItem<'a> {
    metric: &'a str,
    points: &'a [Point],
    #[serde(flatten)]
    options: &'a SubmitOptions,
}

impl DatadogClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        app_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            app_key: app_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
    }

    async fn send(builder: RequestBuilder) -> Result<ApiResponse> {
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ApiResponse::new(status, body))
    }
}

#[async_trait]
impl MetricsBackend for DatadogClient {
    async fn get_points(
        &self,
        query: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ApiResponse> {
        debug!(query, %from, %to, "querying points");
        let builder = self.request(Method::GET, "/api/v1/query").query(&[
            ("from", from.timestamp().to_string()),
            ("to", to.timestamp().to_string()),
            ("query", query.to_owned()),
        ]);
        Self::send(builder).await
    }

    async fn emit_points(
        &self,
        metric: &str,
        points: &[Point],
        options: &SubmitOptions,
    ) -> Result<ApiResponse> {
        let payload = SeriesPayload {
            series: [SeriesItem {
                metric,
                points,
                options,
            }],
        };
        let builder = self.request(Method::POST, "/api/v1/series").json(&payload);
        Self::send(builder).await
    }

    async fn get_metadata(&self, metric: &str) -> Result<ApiResponse> {
        let builder = self.request(Method::GET, &format!("/api/v1/metrics/{metric}"));
        Self::send(builder).await
    }

    async fn update_metadata(
        &self,
        metric: &str,
        metadata: &MetricMetadata,
    ) -> Result<ApiResponse> {
        let builder = self
            .request(Method::PUT, &format!("/api/v1/metrics/{metric}"))
            .json(metadata);
        Self::send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn series_payload_shape() {
        let options = SubmitOptions {
            kind: "rate".into(),
            interval: 60,
            host: "replicationgroup".into(),
            tags: vec!["command:eval".into()],
        };
        let points = [(1_587_356_280, 2.0)];
        let payload = SeriesPayload {
            series: [SeriesItem {
                metric: "elasticache.slowlog.count",
                points: &points,
                options: &options,
            }],
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "series": [{
                    "metric": "elasticache.slowlog.count",
                    "points": [[1_587_356_280, 2.0]],
                    "type": "rate",
                    "interval": 60,
                    "host": "replicationgroup",
                    "tags": ["command:eval"]
                }]
            })
        );
    }

    #[test]
    fn debug_hides_credentials() {
        let client =
            DatadogClient::new(DEFAULT_API_URL, "api-secret", "app-secret", Duration::from_secs(1))
                .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret"));
    }
}
