use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::{minute_precision, Buckets, RunningStat, TimeBucket};
use crate::slowlog::SlowlogEntry;

/// Commands seen active, each with the last minute it was seen in.
///
/// Lives as long as the process so that a command going quiet right at an
/// invocation boundary still gets its zero record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeenCommands(HashMap<String, DateTime<Utc>>);

impl SeenCommands {
    pub fn last_seen(&self, command: &str) -> Option<DateTime<Utc>> {
        self.0.get(command).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Commands last seen strictly before `minute` and absent from `bucket`.
    fn gone_before(&self, minute: DateTime<Utc>, bucket: &TimeBucket) -> Vec<String> {
        self.0
            .iter()
            .filter(|(command, last)| **last < minute && !bucket.contains_key(command.as_str()))
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// Folds one padded minute in. Active commands are stamped with the
    /// later of `minute` and their current stamp; zero records forget the
    /// command unless it was seen at or after `minute`.
    fn observe(&mut self, minute: DateTime<Utc>, bucket: &TimeBucket) {
        for (command, stat) in bucket {
            if stat.count == 0 {
                if self.last_seen(command).is_some_and(|last| last < minute) {
                    self.0.remove(command);
                }
            } else {
                let last = self.0.entry(command.clone()).or_insert(minute);
                if *last < minute {
                    *last = minute;
                }
            }
        }
    }
}

/// Turns raw slowlog entries into per-minute, per-command statistics.
///
/// Aggregating does not touch the seen commands; only [`commit`](Self::commit)
/// does, once the minutes it covers are confirmed delivered.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: SeenCommands,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> &SeenCommands {
        &self.seen
    }

    /// Buckets every complete minute after `watermark`, then zero-pads.
    ///
    /// `entries` must be newest first, as `SLOWLOG GET` returns them.
    pub fn aggregate(
        &self,
        entries: &[SlowlogEntry],
        watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Buckets {
        let mut buckets = bucket_entries(entries, watermark, now);
        let mut pending = self.seen.clone();
        pad_with_zero(&mut buckets, &mut pending);
        buckets
    }

    /// Records the padded `buckets` up to and including `through` as seen.
    pub fn commit(&mut self, buckets: &Buckets, through: DateTime<Utc>) {
        for (&minute, bucket) in buckets.range(..=through) {
            self.seen.observe(minute, bucket);
        }
    }
}

/// One empty bucket for every whole minute from `watermark + 1m` up to the
/// last complete minute before `now`.
pub fn reporting_interval(watermark: DateTime<Utc>, now: DateTime<Utc>) -> Buckets {
    let step = TimeDelta::minutes(1);
    let last = minute_precision(now) - step;

    let mut interval = Buckets::new();
    let mut minute = minute_precision(watermark) + step;
    while minute <= last {
        interval.insert(minute, TimeBucket::new());
        minute += step;
    }
    interval
}

/// Accumulates `entries` into the reporting interval.
///
/// Scanning stops at the first entry at or before the watermark's minute.
/// Entries from the still-open current minute are left for the next run.
pub fn bucket_entries(
    entries: &[SlowlogEntry],
    watermark: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Buckets {
    let mut buckets = reporting_interval(watermark, now);
    let floor = minute_precision(watermark);
    let open_minute = minute_precision(now);

    let mut counted = 0usize;
    for entry in entries {
        let minute = minute_precision(entry.occurred_at);
        if minute <= floor {
            break;
        }
        if minute >= open_minute {
            continue;
        }

        buckets
            .entry(minute)
            .or_default()
            .entry(entry.command.clone())
            .and_modify(|stat| stat.add_sample(entry.duration_micros))
            .or_insert_with(|| RunningStat::new(entry.duration_micros));
        counted += 1;
    }

    debug!(
        entries = entries.len(),
        counted,
        minutes = buckets.len(),
        "bucketed slowlog"
    );
    buckets
}

/// Walks `buckets` oldest first. A command last seen in an earlier minute
/// but missing from the current one gets one zero record there and is
/// forgotten, so it is not padded again until it reappears. Commands whose
/// stamp is at or after the current minute are left alone.
pub fn pad_with_zero(buckets: &mut Buckets, seen: &mut SeenCommands) {
    for (&minute, bucket) in buckets.iter_mut() {
        for command in seen.gone_before(minute, bucket) {
            bucket.insert(command, RunningStat::zero());
        }
        seen.observe(minute, bucket);
    }
}
