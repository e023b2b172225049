/// Audit log, activity statistics and recent searches
use crate::tab_data::{DAY_MS, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

pub const ACTION_LOG_CAP: usize = 10_000;
pub const ACTIVITY_RETENTION_DAYS: i64 = 90;
pub const RECENT_SEARCHES_CAP: usize = 5;

/// One audit log entry: `{type, timestamp, ...details}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ActionEntry {
    /// Non-object details are stored under a `value` key
    pub fn new(kind: &str, details: Value, now: Timestamp) -> ActionEntry {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        ActionEntry {
            kind: kind.to_string(),
            timestamp: now,
            details,
        }
    }
}

/// Append to the log, trimming the oldest entries past the cap
pub fn push_action(log: &mut Vec<ActionEntry>, entry: ActionEntry) {
    log.push(entry);
    if log.len() > ACTION_LOG_CAP {
        let excess = log.len() - ACTION_LOG_CAP;
        log.drain(..excess);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Saved,
    Restored,
    Archived,
    Deleted,
    Merged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub count: u32,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ActivityCounts {
    pub saved: u32,
    pub restored: u32,
    pub archived: u32,
    pub deleted: u32,
    pub merged: u32,
}

impl ActivityCounts {
    pub fn add(&mut self, kind: ActivityKind, count: u32) {
        let slot = match kind {
            ActivityKind::Saved => &mut self.saved,
            ActivityKind::Restored => &mut self.restored,
            ActivityKind::Archived => &mut self.archived,
            ActivityKind::Deleted => &mut self.deleted,
            ActivityKind::Merged => &mut self.merged,
        };
        *slot = slot.saturating_add(count);
    }

    fn merge(&mut self, other: &ActivityCounts) {
        self.saved = self.saved.saturating_add(other.saved);
        self.restored = self.restored.saturating_add(other.restored);
        self.archived = self.archived.saturating_add(other.archived);
        self.deleted = self.deleted.saturating_add(other.deleted);
        self.merged = self.merged.saturating_add(other.merged);
    }
}

/// Pre-aggregated counts for events that aged out of the rolling window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySummary {
    /// `YYYY-MM` in UTC
    pub month: String,
    pub counts: ActivityCounts,
}

/// Rolling 90-day event log plus monthly rollups of everything older
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityStats {
    pub activity_log: Vec<ActivityEvent>,
    pub monthly_summaries: Vec<MonthlySummary>,
}

impl ActivityStats {
    pub fn record(&mut self, kind: ActivityKind, count: u32, now: Timestamp) {
        if count == 0 {
            return;
        }
        self.activity_log.push(ActivityEvent {
            kind,
            count,
            timestamp: now,
        });
        self.roll_up(now);
    }

    /// Fold events older than the retention window into monthly summaries
    pub fn roll_up(&mut self, now: Timestamp) {
        let cutoff = now - ACTIVITY_RETENTION_DAYS * DAY_MS;
        let (expired, retained): (Vec<_>, Vec<_>) = std::mem::take(&mut self.activity_log)
            .into_iter()
            .partition(|e| e.timestamp < cutoff);
        self.activity_log = retained;

        for event in expired {
            let month = month_key(event.timestamp);
            match self.monthly_summaries.iter_mut().find(|s| s.month == month) {
                Some(summary) => summary.counts.add(event.kind, event.count),
                None => {
                    let mut counts = ActivityCounts::default();
                    counts.add(event.kind, event.count);
                    self.monthly_summaries.push(MonthlySummary { month, counts });
                }
            }
        }

        self.monthly_summaries.sort_by(|a, b| a.month.cmp(&b.month));
    }

    /// Totals for one `YYYY-MM` month from both the rollups and live events
    pub fn totals_for_month(&self, month: &str) -> ActivityCounts {
        let mut totals = ActivityCounts::default();
        if let Some(summary) = self.monthly_summaries.iter().find(|s| s.month == month) {
            totals.merge(&summary.counts);
        }
        for event in self.activity_log.iter().filter(|e| month_key(e.timestamp) == month) {
            totals.add(event.kind, event.count);
        }
        totals
    }
}

/// UTC `YYYY-MM` for a millisecond timestamp
pub fn month_key(ts: Timestamp) -> String {
    match OffsetDateTime::from_unix_timestamp_nanos(ts as i128 * 1_000_000) {
        Ok(dt) => format!("{:04}-{:02}", dt.year(), u8::from(dt.month())),
        Err(_) => "invalid".to_string(),
    }
}

/// Most recent first, case-insensitively unique, capped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct RecentSearches(Vec<String>);

impl RecentSearches {
    pub fn record(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }

        let lowered = query.to_lowercase();
        self.0.retain(|q| q.to_lowercase() != lowered);
        self.0.insert(0, query.to_string());
        self.0.truncate(RECENT_SEARCHES_CAP);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2024-03-15T12:00:00Z
    const MARCH_15: Timestamp = 1_710_504_000_000;

    #[test]
    fn test_action_entry_flattens_details() {
        let entry = ActionEntry::new("removeTab", json!({"url": "https://a.com"}), 42);
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value, json!({"type": "removeTab", "timestamp": 42, "url": "https://a.com"}));

        let back: ActionEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_action_log_is_capped() {
        let mut log = Vec::new();
        for i in 0..(ACTION_LOG_CAP + 3) {
            push_action(&mut log, ActionEntry::new("test", Value::Null, i as Timestamp));
        }

        assert_eq!(log.len(), ACTION_LOG_CAP);
        assert_eq!(log[0].timestamp, 3);
        assert_eq!(log.last().unwrap().timestamp, (ACTION_LOG_CAP + 2) as Timestamp);
    }

    #[test]
    fn test_month_key() {
        assert_eq!(month_key(MARCH_15), "2024-03");
        assert_eq!(month_key(0), "1970-01");
    }

    #[test]
    fn test_old_events_roll_into_monthly_summaries() {
        let mut stats = ActivityStats::default();
        stats.record(ActivityKind::Saved, 4, MARCH_15);
        stats.record(ActivityKind::Saved, 2, MARCH_15 + DAY_MS);
        stats.record(ActivityKind::Archived, 1, MARCH_15 + 100 * DAY_MS);

        assert_eq!(stats.activity_log.len(), 1);
        assert_eq!(stats.monthly_summaries.len(), 1);
        assert_eq!(stats.monthly_summaries[0].month, "2024-03");
        assert_eq!(stats.monthly_summaries[0].counts.saved, 6);

        let march = stats.totals_for_month("2024-03");
        assert_eq!(march.saved, 6);
        assert_eq!(march.archived, 0);
    }

    #[test]
    fn test_zero_count_is_ignored() {
        let mut stats = ActivityStats::default();
        stats.record(ActivityKind::Deleted, 0, MARCH_15);
        assert!(stats.activity_log.is_empty());
    }

    #[test]
    fn test_recent_searches() {
        let mut recent = RecentSearches::default();
        for q in ["rust", "yew", "  ", "serde", "wasm", "tokio", "Rust"] {
            recent.record(q);
        }

        assert_eq!(recent.as_slice(), ["Rust", "tokio", "wasm", "serde", "yew"]);
    }
}
