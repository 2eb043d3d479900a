pub mod aggregator;
pub mod emitter;
pub mod stats;

use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

pub use aggregator::Aggregator;
pub use emitter::Emitter;
pub use stats::RunningStat;

/// Per-command statistics for one minute.
pub type TimeBucket = BTreeMap<String, RunningStat>;

/// Minute-truncated timestamp → bucket, iterated oldest first.
pub type Buckets = BTreeMap<DateTime<Utc>, TimeBucket>;

/// Drops the seconds (and anything finer) from `time`.
pub fn minute_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(TimeDelta::minutes(1)).unwrap_or(time)
}

// ─── Reported statistics ─────────────────────────────────────────

/// The statistics shipped for every (minute, command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Avg,
    Count,
    Median,
    Min,
    Max,
    P95,
}

/// How the backend should interpret a submitted point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionType {
    Gauge,
    Rate,
}

impl SubmissionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Rate => "rate",
        }
    }
}

impl Statistic {
    /// Emission order within one (minute, command). The 95th percentile goes
    /// last because its series doubles as the resumption checkpoint.
    pub const ALL: [Statistic; 6] = [
        Self::Avg,
        Self::Count,
        Self::Median,
        Self::Min,
        Self::Max,
        Self::P95,
    ];

    /// Metric name suffix. Metric names may not start with a digit, hence
    /// the spelled-out percentile.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::P95 => "95percentile",
        }
    }

    pub fn submission_type(self) -> SubmissionType {
        match self {
            Self::Count => SubmissionType::Rate,
            _ => SubmissionType::Gauge,
        }
    }
}
