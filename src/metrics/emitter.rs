use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Buckets, RunningStat, Statistic};
use crate::datadog::metadata::REPORTING_INTERVAL_SECS;
use crate::datadog::{status_or_error, Checkpoint, MetricsBackend, SubmitOptions};
use crate::error::{Error, Result};

/// Turns aggregated buckets into backend submissions, one point per call.
#[derive(Debug, Clone)]
pub struct Emitter {
    metric_prefix: String,
    replication_group: String,
    namespace: String,
    env: String,
}

impl Emitter {
    pub fn new(
        metric_prefix: impl Into<String>,
        replication_group: impl Into<String>,
        namespace: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self {
            metric_prefix: metric_prefix.into(),
            replication_group: replication_group.into(),
            namespace: namespace.into(),
            env: env.into(),
        }
    }

    /// Tags every point carries besides `command`.
    pub fn default_tags(&self) -> Vec<String> {
        vec![
            format!("replication_group:{}", self.replication_group),
            format!("service:{}", self.replication_group),
            format!("namespace:{}", self.namespace),
            format!("env:{}", self.env),
            "aws:true".to_owned(),
        ]
    }

    /// Emits every statistic of every command, oldest minute first.
    ///
    /// The first rejected point aborts the rest; `checkpoint` then still
    /// names the last point the backend confirmed. Returns the number of
    /// points sent.
    pub async fn ship<B>(
        &self,
        backend: &B,
        buckets: &Buckets,
        checkpoint: &mut Checkpoint,
    ) -> Result<usize>
    where
        B: MetricsBackend + ?Sized,
    {
        let mut sent = 0;
        for (&minute, bucket) in buckets {
            if bucket.is_empty() {
                debug!(%minute, "no slowlog activity");
                continue;
            }
            for (command, stat) in bucket {
                for statistic in Statistic::ALL {
                    self.emit_point(backend, checkpoint, minute, command, stat, statistic)
                        .await?;
                    sent += 1;
                }
            }
        }
        Ok(sent)
    }

    async fn emit_point<B>(
        &self,
        backend: &B,
        checkpoint: &mut Checkpoint,
        minute: DateTime<Utc>,
        command: &str,
        stat: &RunningStat,
        statistic: Statistic,
    ) -> Result<()>
    where
        B: MetricsBackend + ?Sized,
    {
        let metric = format!("{}.{}", self.metric_prefix, statistic.suffix());
        let value = stat.value(statistic);

        let mut tags = self.default_tags();
        tags.push(format!("command:{command}"));
        let options = SubmitOptions {
            kind: statistic.submission_type().as_str().to_owned(),
            interval: REPORTING_INTERVAL_SECS,
            host: self.replication_group.clone(),
            tags,
        };

        info!(%metric, value, command, %minute, "sending slowlog point");

        let submit_error = |detail: String| Error::BackendSubmit {
            metric: metric.clone(),
            replication_group: self.replication_group.clone(),
            detail,
        };
        let resp = backend
            .emit_points(&metric, &[(minute.timestamp(), value)], &options)
            .await
            .map_err(|e| submit_error(e.to_string()))?;

        let status = status_or_error(&resp);
        if !status.is_ok() {
            return Err(submit_error(status.to_string()));
        }

        if statistic == Statistic::P95 {
            checkpoint.settle(minute);
        } else {
            checkpoint.advance(minute);
        }
        debug!(%metric, %status, %minute, "point accepted");
        Ok(())
    }
}
