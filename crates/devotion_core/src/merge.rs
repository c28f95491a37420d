//! crates/devotion_core/src/merge.rs
//!
//! Best-effort reconciliation of a cloud record list with a local record list.
//!
//! Records are grouped by their *local* calendar day (a user journals in their
//! own timezone, so 23:30 and 00:30 UTC can be the same evening). For a day
//! present in both sources the record with more text content wins; on a tie,
//! the later timestamp wins. This is a heuristic, not a CRDT: concurrent
//! same-day edits from two devices can silently lose the shorter side.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::domain::{CheckInRecord, DevotionRecord};

/// The calendar-day key a record is grouped under during reconciliation.
/// Derived from the record timestamp in the local timezone, not UTC.
pub fn local_day_key(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// A record kind that can take part in merge-by-date reconciliation.
pub trait DayKeyed {
    fn timestamp(&self) -> DateTime<Utc>;

    /// Combined length of the record's free-text content, used to pick the
    /// "more complete" record when one day appears in both sources.
    fn content_len(&self) -> usize;
}

impl DayKeyed for CheckInRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }

    fn content_len(&self) -> usize {
        self.mood.as_deref().map_or(0, |m| m.chars().count())
            + self.note.as_deref().map_or(0, |n| n.chars().count())
    }
}

impl DayKeyed for DevotionRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }

    fn content_len(&self) -> usize {
        self.observation.chars().count()
            + self.application.chars().count()
            + self.prayer_text.chars().count()
    }
}

/// Merges the cloud and local lists into a single list with at most one
/// record per calendar day, sorted descending by timestamp.
///
/// Days present in only one source are kept as-is. For days present in both,
/// the record with the larger [`DayKeyed::content_len`] wins; equal lengths
/// fall back to the later timestamp.
pub fn merge_by_day<T: DayKeyed + Clone>(cloud: &[T], local: &[T]) -> Vec<T> {
    let mut by_day: HashMap<NaiveDate, T> = HashMap::new();

    for record in cloud {
        by_day.insert(local_day_key(record.timestamp()), record.clone());
    }

    for candidate in local {
        let key = local_day_key(candidate.timestamp());
        match by_day.get(&key) {
            None => {
                by_day.insert(key, candidate.clone());
            }
            Some(existing) => {
                let longer = candidate.content_len() > existing.content_len();
                let tie_but_newer = candidate.content_len() == existing.content_len()
                    && candidate.timestamp() > existing.timestamp();
                if longer || tie_but_newer {
                    by_day.insert(key, candidate.clone());
                }
            }
        }
    }

    let mut merged: Vec<T> = by_day.into_values().collect();
    merged.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn check_in(date: DateTime<Utc>, mood: Option<&str>, note: Option<&str>) -> CheckInRecord {
        CheckInRecord {
            id: Uuid::new_v4(),
            date,
            mood: mood.map(str::to_string),
            note: note.map(str::to_string),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        // Noon-ish local-safe hours so a test machine's timezone cannot
        // shift the record across a day boundary.
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid local datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn merging_a_list_with_itself_is_identity() {
        let a = vec![
            check_in(at(2024, 1, 2, 12), Some("🙏"), Some("grateful")),
            check_in(at(2024, 1, 1, 12), None, Some("quiet day")),
        ];
        let merged = merge_by_day(&a, &a);
        assert_eq!(merged, a);
    }

    #[test]
    fn merged_output_never_repeats_a_day_key() {
        let cloud = vec![
            check_in(at(2024, 3, 1, 9), Some("😊"), None),
            check_in(at(2024, 3, 2, 9), None, Some("cloud note")),
        ];
        let local = vec![
            check_in(at(2024, 3, 1, 20), None, Some("evening addition")),
            check_in(at(2024, 3, 3, 9), Some("😌"), None),
        ];
        let merged = merge_by_day(&cloud, &local);
        let days: HashSet<NaiveDate> =
            merged.iter().map(|c| local_day_key(c.date)).collect();
        assert_eq!(days.len(), merged.len());
    }

    #[test]
    fn disjoint_days_merge_to_the_union() {
        let cloud = vec![check_in(at(2024, 5, 1, 12), Some("😊"), None)];
        let local = vec![
            check_in(at(2024, 5, 2, 12), None, Some("a walk")),
            check_in(at(2024, 5, 3, 12), None, None),
        ];
        let merged = merge_by_day(&cloud, &local);
        assert_eq!(merged.len(), 3);
        // Sorted descending by timestamp.
        assert_eq!(local_day_key(merged[0].date), local_day_key(local[1].date));
        assert_eq!(local_day_key(merged[2].date), local_day_key(cloud[0].date));
    }

    #[test]
    fn longer_content_wins_for_a_shared_day() {
        let local = vec![check_in(at(2024, 1, 1, 12), None, Some("short"))];
        let cloud = vec![check_in(at(2024, 1, 1, 8), None, Some("a longer note here"))];
        let merged = merge_by_day(&cloud, &local);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].note.as_deref(), Some("a longer note here"));
    }

    #[test]
    fn equal_content_falls_back_to_later_timestamp() {
        let cloud = vec![check_in(at(2024, 1, 1, 8), None, Some("same"))];
        let local = vec![check_in(at(2024, 1, 1, 20), None, Some("same"))];
        let merged = merge_by_day(&cloud, &local);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, local[0].id);
    }

    #[test]
    fn older_but_longer_local_record_still_wins() {
        let cloud = vec![check_in(at(2024, 1, 1, 20), Some("😊"), None)];
        let local = vec![check_in(
            at(2024, 1, 1, 8),
            Some("😊"),
            Some("wrote quite a bit this morning"),
        )];
        let merged = merge_by_day(&cloud, &local);
        assert_eq!(merged[0].id, local[0].id);
    }

    #[test]
    fn devotion_records_merge_on_combined_journal_length() {
        let mk = |date, observation: &str, prayer: &str| DevotionRecord {
            id: Uuid::new_v4(),
            date,
            scripture: vec![],
            observation: observation.to_string(),
            application: String::new(),
            prayer_text: prayer.to_string(),
        };
        let cloud = vec![mk(at(2024, 2, 1, 9), "noticed stillness", "")];
        let local = vec![mk(at(2024, 2, 1, 7), "noticed", "Lord, teach me to rest")];
        let merged = merge_by_day(&cloud, &local);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, local[0].id);
    }
}
