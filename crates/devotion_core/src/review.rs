//! crates/devotion_core/src/review.rs
//!
//! Review-period preparation: week/month ranges, range filtering, and the
//! prompt handed to whichever language-model provider is configured.

use chrono::{Datelike, Months, NaiveDate, Weekday};

use crate::domain::{CheckInRecord, DevotionRecord, PeriodRange, ReviewData, ReviewPeriod};
use crate::merge::local_day_key;

/// The Monday-through-Sunday week containing `today`.
pub fn week_range(today: NaiveDate) -> PeriodRange {
    let week = today.week(Weekday::Mon);
    PeriodRange {
        start: week.first_day(),
        end: week.last_day(),
    }
}

/// The first through last day of the month containing `today`.
pub fn month_range(today: NaiveDate) -> PeriodRange {
    let start = today.with_day(1).unwrap_or(today);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(today);
    PeriodRange { start, end }
}

impl PeriodRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Filters both record kinds down to `period` around `today` and bundles
/// them for prompt assembly. Membership is decided on the local calendar
/// day of each record, matching the merge key.
pub fn prepare_review_data(
    devotion_records: &[DevotionRecord],
    check_in_records: &[CheckInRecord],
    period: ReviewPeriod,
    today: NaiveDate,
) -> ReviewData {
    let range = match period {
        ReviewPeriod::Week => week_range(today),
        ReviewPeriod::Month => month_range(today),
    };
    ReviewData {
        devotion_records: devotion_records
            .iter()
            .filter(|r| range.contains(local_day_key(r.date)))
            .cloned()
            .collect(),
        check_in_records: check_in_records
            .iter()
            .filter(|c| range.contains(local_day_key(c.date)))
            .cloned()
            .collect(),
        period,
        range,
    }
}

/// Assembles the free-text prompt sent to the review provider.
pub fn build_prompt(data: &ReviewData) -> String {
    let label = data.period.label();
    let mut prompt = format!(
        "Please put together my {} review ({} to {}):\n\n",
        label, data.range.start, data.range.end
    );

    if data.devotion_records.is_empty() {
        prompt.push_str(&format!(
            "## Devotion records: none for this {}\n\n",
            period_noun(data.period)
        ));
    } else {
        prompt.push_str(&format!(
            "## Devotion records ({} entries)\n\n",
            data.devotion_records.len()
        ));
        for (index, record) in data.devotion_records.iter().enumerate() {
            prompt.push_str(&format!(
                "### {}. {}\n",
                index + 1,
                local_day_key(record.date)
            ));
            for passage in &record.scripture {
                prompt.push_str(&format!(
                    "Scripture: {}: {}\n",
                    passage.reference, passage.text
                ));
            }
            if !record.observation.is_empty() {
                prompt.push_str(&format!("Observation: {}\n", record.observation));
            }
            if !record.application.is_empty() {
                prompt.push_str(&format!("Application: {}\n", record.application));
            }
            if !record.prayer_text.is_empty() {
                prompt.push_str(&format!("Prayer: {}\n", record.prayer_text));
            }
            prompt.push('\n');
        }
    }

    if data.check_in_records.is_empty() {
        prompt.push_str(&format!(
            "## Check-ins: none for this {}\n\n",
            period_noun(data.period)
        ));
    } else {
        prompt.push_str(&format!(
            "## Check-ins ({} entries)\n\n",
            data.check_in_records.len()
        ));
        for check_in in &data.check_in_records {
            prompt.push_str(&format!("- {}", local_day_key(check_in.date)));
            if let Some(mood) = &check_in.mood {
                prompt.push_str(&format!(", mood: {}", mood));
            }
            if let Some(note) = &check_in.note {
                prompt.push_str(&format!(", note: {}", note));
            }
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    let noun = period_noun(data.period);
    prompt.push_str(&format!(
        "\nBased on the records above, please put together a {label} review covering:\n\
         1. The devotional themes and emphases of this {noun}\n\
         2. What God has been saying to me this {noun}\n\
         3. Growth and change this {noun}\n\
         4. Things to be thankful for\n\
         5. Directions to keep pursuing next {noun}\n\n\
         Please respond in a warm, encouraging tone.",
    ));

    prompt
}

fn period_noun(period: ReviewPeriod) -> &'static str {
    match period {
        ReviewPeriod::Week => "week",
        ReviewPeriod::Month => "month",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScripturePassage;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use uuid::Uuid;

    fn at_noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .single()
            .expect("valid local datetime")
            .with_timezone(&Utc)
    }

    fn devotion(date: DateTime<Utc>) -> DevotionRecord {
        DevotionRecord {
            id: Uuid::new_v4(),
            date,
            scripture: vec![ScripturePassage {
                reference: "Psalm 46:10".to_string(),
                text: "Be still, and know that I am God.".to_string(),
            }],
            observation: "stillness".to_string(),
            application: String::new(),
            prayer_text: "teach me to rest".to_string(),
        }
    }

    fn check_in(date: DateTime<Utc>, note: &str) -> CheckInRecord {
        CheckInRecord {
            id: Uuid::new_v4(),
            date,
            mood: Some("😌".to_string()),
            note: Some(note.to_string()),
        }
    }

    #[test]
    fn week_range_starts_on_monday() {
        // 2024-01-10 was a Wednesday.
        let range = week_range(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
    }

    #[test]
    fn week_range_keeps_sunday_in_the_preceding_week() {
        // 2024-01-14 was a Sunday; with Monday-start weeks it closes the week.
        let range = week_range(NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn month_range_covers_the_whole_month() {
        let range = month_range(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn december_month_range_ends_on_the_31st() {
        let range = month_range(NaiveDate::from_ymd_opt(2023, 12, 3).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn prepare_filters_records_outside_the_period() {
        let inside = devotion(at_noon(2024, 1, 10));
        let outside = devotion(at_noon(2024, 1, 20));
        let check_inside = check_in(at_noon(2024, 1, 9), "calm");
        let data = prepare_review_data(
            &[inside.clone(), outside],
            &[check_inside.clone()],
            ReviewPeriod::Week,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        );
        assert_eq!(data.devotion_records, vec![inside]);
        assert_eq!(data.check_in_records, vec![check_inside]);
    }

    #[test]
    fn prompt_includes_records_and_the_review_questions() {
        let data = prepare_review_data(
            &[devotion(at_noon(2024, 1, 10))],
            &[check_in(at_noon(2024, 1, 9), "a calm morning")],
            ReviewPeriod::Week,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        );
        let prompt = build_prompt(&data);
        assert!(prompt.contains("## Devotion records (1 entries)"));
        assert!(prompt.contains("Psalm 46:10"));
        assert!(prompt.contains("Observation: stillness"));
        assert!(prompt.contains("mood: 😌"));
        assert!(prompt.contains("note: a calm morning"));
        assert!(prompt.contains("Things to be thankful for"));
    }

    #[test]
    fn prompt_marks_empty_sections() {
        let data = prepare_review_data(
            &[],
            &[],
            ReviewPeriod::Month,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        );
        let prompt = build_prompt(&data);
        assert!(prompt.contains("## Devotion records: none for this month"));
        assert!(prompt.contains("## Check-ins: none for this month"));
    }
}
