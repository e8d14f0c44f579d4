//! # Scan History
//!
//! Bounded, newest-first log of decoded scans plus the derived stats shown in
//! the "recent scans" panel.
//!
//! ## Eviction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(E51)                                                            │
//! │                                                                         │
//! │   front (newest)                                     back (oldest)      │
//! │   ┌─────┬─────┬─────┬─────┬───────────────┬─────┐                      │
//! │   │ E51 │ E50 │ E49 │ E48 │      ...      │ E2  │  ──► E1 evicted      │
//! │   └─────┴─────┴─────┴─────┴───────────────┴─────┘                      │
//! │                                                                         │
//! │   len() never exceeds HISTORY_CAPACITY (50)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{BarcodeFormat, ScanEvent};
use crate::HISTORY_CAPACITY;

// =============================================================================
// Scan History
// =============================================================================

/// Newest-first scan log with FIFO eviction.
#[derive(Debug, Clone, Default)]
pub struct ScanHistory {
    events: VecDeque<ScanEvent>,
}

impl ScanHistory {
    pub fn new() -> Self {
        ScanHistory {
            events: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Prepends an event, evicting the oldest once full. Never fails.
    pub fn record(&mut self, event: ScanEvent) {
        self.events.push_front(event);
        self.events.truncate(HISTORY_CAPACITY);
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<&ScanEvent> {
        self.events.front()
    }

    /// Events, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ScanEvent> {
        self.events.iter()
    }

    /// Snapshot of the events, newest first.
    pub fn to_vec(&self) -> Vec<ScanEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Stats relative to the local calendar day.
    pub fn stats(&self) -> ScanStats {
        self.stats_at(Local::now())
    }

    /// Stats relative to the calendar day of `now` in `now`'s timezone.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use stockscan_core::{BarcodeFormat, ScanEvent, ScanHistory};
    ///
    /// let mut history = ScanHistory::new();
    /// let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    /// history.record(ScanEvent::at("0123456789012", BarcodeFormat::Ean13, at).unwrap());
    ///
    /// let stats = history.stats_at(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
    /// assert_eq!(stats.total, 1);
    /// assert_eq!(stats.today, 1);
    /// ```
    pub fn stats_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> ScanStats {
        let today = now.date_naive();
        let tz = now.timezone();

        let mut by_format = BTreeMap::new();
        let mut today_count = 0;

        for event in &self.events {
            *by_format.entry(event.format).or_insert(0) += 1;
            if event.timestamp.with_timezone(&tz).date_naive() == today {
                today_count += 1;
            }
        }

        ScanStats {
            total: self.events.len(),
            today: today_count,
            by_format,
            last_scan: self.events.front().map(|e| e.timestamp),
        }
    }
}

// =============================================================================
// Scan Stats
// =============================================================================

/// Read-only summary of the history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total: usize,
    pub today: usize,
    pub by_format: BTreeMap<BarcodeFormat, usize>,
    #[ts(as = "Option<String>")]
    pub last_scan: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn event(code: &str, format: BarcodeFormat, at: DateTime<Utc>) -> ScanEvent {
        ScanEvent::at(code, format, at).unwrap()
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let mut history = ScanHistory::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        for i in 0..120 {
            let e = event(
                &format!("CODE-{}", i),
                BarcodeFormat::Code128,
                start + Duration::seconds(i),
            );
            history.record(e);

            assert!(history.len() <= HISTORY_CAPACITY);
            assert_eq!(history.latest().unwrap().code, format!("CODE-{}", i));
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        // Oldest retained is #70: #0..#69 were evicted in order
        assert_eq!(history.iter().last().unwrap().code, "CODE-70");
    }

    #[test]
    fn test_clear() {
        let mut history = ScanHistory::new();
        history.record(event("A", BarcodeFormat::QrCode, Utc::now()));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stats().total, 0);
        assert!(history.stats().last_scan.is_none());
    }

    #[test]
    fn test_stats_counts_formats_and_today() {
        let mut history = ScanHistory::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 15, 0, 0).unwrap();

        history.record(event("old", BarcodeFormat::Ean13, now - Duration::days(1)));
        history.record(event("a", BarcodeFormat::Ean13, now - Duration::hours(2)));
        history.record(event("b", BarcodeFormat::QrCode, now - Duration::minutes(5)));

        let stats = history.stats_at(now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.today, 2);
        assert_eq!(stats.by_format.get(&BarcodeFormat::Ean13), Some(&2));
        assert_eq!(stats.by_format.get(&BarcodeFormat::QrCode), Some(&1));
        assert_eq!(stats.last_scan, Some(now - Duration::minutes(5)));
    }

    #[test]
    fn test_today_uses_callers_calendar_day() {
        let mut history = ScanHistory::new();
        // 23:30 UTC on May 1st is already May 2nd in UTC+2
        let scanned = Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
        history.record(event("late", BarcodeFormat::Code39, scanned));

        let utc_plus_2 = FixedOffset::east_opt(2 * 3600).unwrap();
        let morning = utc_plus_2.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        assert_eq!(history.stats_at(morning).today, 1);

        let utc_morning = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        assert_eq!(history.stats_at(utc_morning).today, 0);
    }
}
