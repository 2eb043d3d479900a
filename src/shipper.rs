use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::Clock;
use crate::datadog::{Checkpoint, MetadataSync, MetricsBackend};
use crate::metrics::{Aggregator, Emitter};
use crate::slowlog::{SlowlogReader, SlowlogSource};

use crate::error::Result;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipReport {
    /// Resumption point found in the backend at the start of the run.
    pub resumed_from: DateTime<Utc>,
    /// Last confirmed point at the end of the run.
    pub watermark: DateTime<Utc>,
    pub entries_read: usize,
    pub minutes: usize,
    pub points_sent: usize,
}

/// Naming and tagging shared by every run.
#[derive(Debug, Clone)]
pub struct ShipperSettings {
    pub metric_prefix: String,
    pub namespace: String,
    pub env: String,
    pub page_size: usize,
}

/// Process-lifetime session for one replication group.
///
/// Holds what may outlive a single invocation: the commands seen active
/// and whether metadata has been synced. The watermark is not kept here; it
/// is resolved from the backend at the start of every run, and the seen
/// commands are only committed up to the minute that run settled.
pub struct Shipper<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    replication_group: String,
    metric_prefix: String,
    reader: SlowlogReader,
    aggregator: Aggregator,
    emitter: Emitter,
    metadata: MetadataSync,
    metadata_synced: bool,
}

impl<B: MetricsBackend> Shipper<B> {
    pub fn new(
        backend: B,
        replication_group: impl Into<String>,
        settings: ShipperSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let replication_group = replication_group.into();
        Self {
            emitter: Emitter::new(
                settings.metric_prefix.clone(),
                replication_group.clone(),
                settings.namespace,
                settings.env,
            ),
            metadata: MetadataSync::new(settings.metric_prefix.clone()),
            reader: SlowlogReader::new(settings.page_size),
            aggregator: Aggregator::new(),
            metric_prefix: settings.metric_prefix,
            replication_group,
            backend,
            clock,
            metadata_synced: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// One invocation: sync metadata (first time only), find the watermark,
    /// read the slowlog, aggregate, emit.
    pub async fn ship<S>(&mut self, source: &mut S) -> Result<ShipReport>
    where
        S: SlowlogSource + ?Sized,
    {
        if !self.metadata_synced {
            let updated = self.metadata.run(&self.backend).await;
            info!(updated, "metadata in sync");
            self.metadata_synced = true;
        }

        let now = self.clock.now();
        let mut checkpoint =
            Checkpoint::resolve(&self.backend, &self.metric_prefix, &self.replication_group, now)
                .await?;
        let resumed_from = checkpoint.watermark();

        let entries = self.reader.read_all(source).await;
        let buckets = self.aggregator.aggregate(&entries, resumed_from, now);
        let shipped = self
            .emitter
            .ship(&self.backend, &buckets, &mut checkpoint)
            .await;
        // Seen commands only move as far as the next run will resume from.
        self.aggregator.commit(&buckets, checkpoint.settled());
        let points_sent = shipped?;

        let report = ShipReport {
            resumed_from,
            watermark: checkpoint.watermark(),
            entries_read: entries.len(),
            minutes: buckets.len(),
            points_sent,
        };
        info!(
            replication_group = %self.replication_group,
            resumed_from = %report.resumed_from,
            watermark = %report.watermark,
            entries = report.entries_read,
            points = report.points_sent,
            tracked_commands = self.aggregator.seen().len(),
            "shipped slowlog"
        );
        Ok(report)
    }
}
