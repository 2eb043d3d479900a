use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use super::{status_or_error, MetricsBackend, QueryResponse};
use crate::error::{Error, Result};
use crate::metrics::{minute_precision, Statistic};

/// How far back to look for our own previous points.
const QUERY_WINDOW_SECS: i64 = 2 * 3600;

/// Where a first run starts when nothing was ever emitted.
const FIRST_RUN_LOOKBACK_SECS: i64 = 3600;

/// The minute up to which points are known to have been delivered.
///
/// Never persisted locally: resolved from the backend at the start of a run,
/// then advanced in memory as points are confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    watermark: DateTime<Utc>,
    /// Latest minute with a confirmed checkpoint-series point, i.e. where
    /// the next `resolve` will pick up.
    settled: DateTime<Utc>,
}

/// Query selecting this job's own 95th-percentile series for one group.
pub fn checkpoint_query(metric_prefix: &str, replication_group: &str) -> String {
    format!(
        "{metric_prefix}.{}{{replication_group:{replication_group}}}",
        Statistic::P95.suffix()
    )
}

impl Checkpoint {
    pub fn at(watermark: DateTime<Utc>) -> Self {
        Self {
            watermark,
            settled: watermark,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn settled(&self) -> DateTime<Utc> {
        self.settled
    }

    /// Records a confirmed point at `timestamp`.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) {
        self.watermark = timestamp;
    }

    /// Records a confirmed checkpoint-series point at `timestamp`.
    pub fn settle(&mut self, timestamp: DateTime<Utc>) {
        self.advance(timestamp);
        self.settled = self.settled.max(timestamp);
    }

    /// Latest point the backend holds for our p95 series over the last two
    /// hours, or an hour before `now` when there is none.
    pub async fn resolve<B>(
        backend: &B,
        metric_prefix: &str,
        replication_group: &str,
        now: DateTime<Utc>,
    ) -> Result<Self>
    where
        B: MetricsBackend + ?Sized,
    {
        let query = checkpoint_query(metric_prefix, replication_group);
        let query_error = |detail: String| Error::BackendQuery {
            query: query.clone(),
            detail,
        };

        let resp = backend
            .get_points(&query, now - TimeDelta::seconds(QUERY_WINDOW_SECS), now)
            .await
            .map_err(|e| query_error(e.to_string()))?;

        let status = status_or_error(&resp);
        if !status.is_ok() {
            return Err(query_error(status.to_string()));
        }

        let parsed: QueryResponse = serde_json::from_value(resp.body)
            .map_err(|e| query_error(format!("unreadable series: {e}")))?;

        let latest_ms = parsed
            .series
            .iter()
            .flat_map(|series| series.pointlist.iter().map(|(ts, _)| *ts))
            .reduce(f64::max);

        // Backend timestamps are milliseconds.
        let latest = latest_ms.and_then(|ms| DateTime::from_timestamp((ms / 1000.0) as i64, 0));
        let watermark = match latest {
            Some(latest) => {
                debug!(%latest, "found previously emitted point");
                minute_precision(latest)
            }
            None => {
                info!(replication_group, "no previous points, starting an hour back");
                minute_precision(now - TimeDelta::seconds(FIRST_RUN_LOOKBACK_SECS))
            }
        };

        Ok(Self::at(watermark))
    }
}
