pub mod reader;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Value;

pub use reader::SlowlogReader;

/// One entry of the cache server's slowlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowlogEntry {
    /// Server-assigned log id. Only used to tell whether the log was read in full.
    pub sequence_id: u64,
    pub occurred_at: DateTime<Utc>,
    pub duration_micros: u64,
    /// First token of the executed command, e.g. `eval`.
    pub command: String,
    pub client_address: String,
    pub client_name: String,
}

/// Anything that answers `SLOWLOG GET <length>`.
///
/// The raw reply is returned untouched; interpreting it is the reader's job
/// so that malformed replies degrade instead of erroring.
#[async_trait]
pub trait SlowlogSource: Send {
    async fn slowlog_get(&mut self, length: usize) -> redis::RedisResult<Value>;
}

// ─── Reply parsing ───────────────────────────────────────────────

/// A parsed `SLOWLOG GET` reply.
#[derive(Debug, Default)]
pub struct SlowlogPage {
    /// Number of items the server returned, including ones we could not parse.
    pub returned: usize,
    /// The oldest item's id, when the oldest item was readable.
    pub oldest_sequence_id: Option<u64>,
    pub entries: Vec<SlowlogEntry>,
}

impl SlowlogPage {
    /// Anything other than an array of entries is treated as an empty log.
    pub fn parse(reply: &Value) -> Self {
        let Value::Bulk(items) = reply else {
            return Self::default();
        };

        let entries: Vec<SlowlogEntry> = items.iter().filter_map(parse_entry).collect();
        let oldest_sequence_id = items.last().and_then(parse_entry).map(|e| e.sequence_id);

        Self {
            returned: items.len(),
            oldest_sequence_id,
            entries,
        }
    }
}

/// `[id, unix_seconds, micros, [command, args..], client_addr, client_name]`.
/// The two client fields only exist on Redis 4+ and default to empty.
fn parse_entry(item: &Value) -> Option<SlowlogEntry> {
    let Value::Bulk(fields) = item else {
        return None;
    };

    let sequence_id = as_u64(fields.first()?)?;
    let occurred_at = DateTime::from_timestamp(as_i64(fields.get(1)?)?, 0)?;
    let duration_micros = as_u64(fields.get(2)?)?;
    let command = match fields.get(3)? {
        Value::Bulk(argv) => as_string(argv.first()?)?,
        _ => return None,
    };

    Some(SlowlogEntry {
        sequence_id,
        occurred_at,
        duration_micros,
        command,
        client_address: fields.get(4).and_then(as_string).unwrap_or_default(),
        client_name: fields.get(5).and_then(as_string).unwrap_or_default(),
    })
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Data(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    as_i64(value).and_then(|n| u64::try_from(n).ok())
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::Data(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Status(s) => Some(s.clone()),
        _ => None,
    }
}

// ─── Test doubles ────────────────────────────────────────────────
