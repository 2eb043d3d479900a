use tracing::{debug, info, warn};

use super::{status_or_error, MetricMetadata, MetricsBackend};
use crate::metrics::{Statistic, SubmissionType};

/// Seconds between points of every series.
pub const REPORTING_INTERVAL_SECS: u64 = 60;

/// Order metadata is checked in.
const SYNC_ORDER: [Statistic; 6] = [
    Statistic::Avg,
    Statistic::Median,
    Statistic::Min,
    Statistic::Max,
    Statistic::P95,
    Statistic::Count,
];

/// Keeps the backend's descriptive metadata for our six series in line with
/// what this tool emits.
///
/// Only records that are missing or differ in any field are pushed, so
/// running it again is harmless.
#[derive(Debug, Clone)]
pub struct MetadataSync {
    metric_prefix: String,
}

impl MetadataSync {
    pub fn new(metric_prefix: impl Into<String>) -> Self {
        Self {
            metric_prefix: metric_prefix.into(),
        }
    }

    fn metric_name(&self, statistic: Statistic) -> String {
        format!("{}.{}", self.metric_prefix, statistic.suffix())
    }

    /// The metadata every series should carry.
    pub fn desired(&self) -> Vec<(String, MetricMetadata)> {
        SYNC_ORDER
            .iter()
            .map(|&statistic| (self.metric_name(statistic), desired_metadata(statistic)))
            .collect()
    }

    /// Series whose registered metadata is absent or differs from
    /// [`desired`](Self::desired). A failed read counts as absent.
    pub async fn diff<B>(&self, backend: &B) -> Vec<(String, MetricMetadata)>
    where
        B: MetricsBackend + ?Sized,
    {
        let mut stale = Vec::new();
        for (name, desired) in self.desired() {
            let registered = match backend.get_metadata(&name).await {
                Ok(resp) if resp.is_success() => {
                    serde_json::from_value::<MetricMetadata>(resp.body).ok()
                }
                Ok(resp) => {
                    debug!(metric = %name, status = %status_or_error(&resp), "no metadata registered");
                    None
                }
                Err(e) => {
                    warn!(metric = %name, error = %e, "reading metadata failed");
                    None
                }
            };

            if registered.as_ref() != Some(&desired) {
                stale.push((name, desired));
            }
        }
        stale
    }

    /// Pushes every stale record. Update failures are logged, not raised.
    /// Returns how many records the backend accepted.
    pub async fn run<B>(&self, backend: &B) -> usize
    where
        B: MetricsBackend + ?Sized,
    {
        let mut updated = 0;
        for (name, metadata) in self.diff(backend).await {
            match backend.update_metadata(&name, &metadata).await {
                Ok(resp) if resp.is_success() => {
                    info!(metric = %name, "updated metadata");
                    updated += 1;
                }
                Ok(resp) => {
                    warn!(metric = %name, status = %status_or_error(&resp), "metadata update rejected");
                }
                Err(e) => {
                    warn!(metric = %name, error = %e, "metadata update failed");
                }
            }
        }
        updated
    }
}

fn desired_metadata(statistic: Statistic) -> MetricMetadata {
    match statistic.submission_type() {
        SubmissionType::Rate => MetricMetadata {
            description: Some("slowlog entries per minute".into()),
            short_name: Some("per minute".into()),
            integration: None,
            statsd_interval: Some(REPORTING_INTERVAL_SECS),
            per_unit: Some("minute".into()),
            kind: Some(SubmissionType::Rate.as_str().into()),
            unit: Some("entry".into()),
        },
        SubmissionType::Gauge => {
            let suffix = statistic.suffix();
            MetricMetadata {
                description: Some(format!("slowlog duration {suffix} (µs)")),
                short_name: Some(format!("{suffix} (µs)")),
                integration: None,
                statsd_interval: Some(REPORTING_INTERVAL_SECS),
                per_unit: None,
                kind: Some(SubmissionType::Gauge.as_str().into()),
                unit: Some("microsecond".into()),
            }
        }
    }
}
