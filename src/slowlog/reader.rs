use tracing::{debug, warn};

use super::{SlowlogEntry, SlowlogPage, SlowlogSource};

/// First `SLOWLOG GET` length tried.
pub const DEFAULT_PAGE_SIZE: usize = 128;

/// Largest `SLOWLOG GET` length ever requested. Generous, not a protocol limit.
pub const MAX_PAGE_SIZE: usize = 1_048_576;

/// Reads the whole slowlog even though a single `SLOWLOG GET n` only
/// returns the newest `n` entries.
///
/// Each attempt doubles `n` and supersedes the previous page, so the result
/// is the last (largest) page rather than a concatenation.
#[derive(Debug, Clone, Copy)]
pub struct SlowlogReader {
    page_size: usize,
    ceiling: usize,
}

impl Default for SlowlogReader {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SlowlogReader {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ceiling: MAX_PAGE_SIZE,
        }
    }

    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling.max(1);
        self
    }

    /// Never fails: on a cache error the entries from the last successful
    /// page (possibly none) are returned.
    pub async fn read_all<S>(&self, source: &mut S) -> Vec<SlowlogEntry>
    where
        S: SlowlogSource + ?Sized,
    {
        let mut length = self.page_size.min(self.ceiling);
        let mut latest = Vec::new();

        loop {
            let page = match source.slowlog_get(length).await {
                Ok(reply) => SlowlogPage::parse(&reply),
                Err(e) => {
                    warn!(length, error = %e, "SLOWLOG GET failed; keeping partial slowlog");
                    return latest;
                }
            };

            // A short page, or the server's id-0 entry at the tail, means
            // nothing older is left to fetch.
            let complete = page.returned < length || page.oldest_sequence_id == Some(0);
            latest = page.entries;

            if complete {
                debug!(length, entries = latest.len(), "read full slowlog");
                return latest;
            }
            if length >= self.ceiling {
                warn!(
                    ceiling = self.ceiling,
                    "slowlog larger than read ceiling; older entries skipped"
                );
                return latest;
            }

            length = length.saturating_mul(2).min(self.ceiling);
            debug!(length, "slowlog page was full, widening");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::super::mock::{raw_entry, MockSlowlog};
    use super::*;

    /// `count` entries one second apart with ids `first_id..`, newest first.
    fn log(count: u64, first_id: u64) -> MockSlowlog {
        let start = Utc.with_ymd_and_hms(2020, 4, 20, 4, 0, 0).unwrap();
        let entries = (0..count)
            .rev()
            .map(|x| raw_entry(x + first_id, start + Duration::seconds(x as i64), x, "get"))
            .collect();
        MockSlowlog::new(entries)
    }

    #[tokio::test]
    async fn short_log_needs_one_read() {
        let mut source = log(4, 0);
        let entries = SlowlogReader::default().read_all(&mut source).await;

        assert_eq!(entries.len(), 4);
        assert_eq!(source.calls, vec![128]);
    }

    #[tokio::test]
    async fn sentinel_beyond_first_page_needs_exactly_one_more_read() {
        // 129 entries, id 0 is the oldest and only visible on the 256 read.
        let mut source = log(129, 0);
        let entries = SlowlogReader::default().read_all(&mut source).await;

        assert_eq!(entries.len(), 129);
        assert_eq!(source.calls, vec![128, 256]);
        assert_eq!(entries.last().unwrap().sequence_id, 0);
    }

    #[tokio::test]
    async fn log_without_sentinel_stops_on_short_page() {
        let mut source = log(567, 1);
        let entries = SlowlogReader::default().read_all(&mut source).await;

        assert_eq!(entries.len(), 567);
        assert_eq!(source.calls, vec![128, 256, 512, 1024]);
    }

    #[tokio::test]
    async fn exact_page_with_sentinel_is_complete() {
        let mut source = log(128, 0);
        SlowlogReader::default().read_all(&mut source).await;

        assert_eq!(source.calls, vec![128]);
    }

    #[tokio::test]
    async fn ceiling_bounds_the_largest_read() {
        let mut source = log(2_000, 1);
        let entries = SlowlogReader::default()
            .with_ceiling(512)
            .read_all(&mut source)
            .await;

        assert_eq!(entries.len(), 512);
        assert_eq!(source.calls, vec![128, 256, 512]);
    }

    #[tokio::test]
    async fn cache_errors_yield_an_empty_log() {
        let mut source = log(10, 0);
        source.fail = true;
        let entries = SlowlogReader::default().read_all(&mut source).await;

        assert!(entries.is_empty());
        assert_eq!(source.calls, vec![128]);
    }
}
