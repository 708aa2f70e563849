//! Human-readable dates for note lists and the editor footer.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

/// "today", "yesterday", else short month and day ("Mar 5"), by calendar day
pub fn note_date_label<Tz: TimeZone>(at: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    match (now.date_naive() - at.date_naive()).num_days() {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        _ => at.format("%b %-d").to_string(),
    }
}

/// "March 5, 2026 at 3:07pm"
pub fn last_edited_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%B %-d, %Y at %-I:%M%P").to_string()
}

pub fn local_note_date_label(at: DateTime<Utc>) -> String {
    note_date_label(&at.with_timezone(&Local), &Local::now())
}

pub fn local_last_edited_label(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => last_edited_label(&at.with_timezone(&Local)),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_same_calendar_day_is_today() {
        let now = utc("2026-03-05T23:59:00Z");
        assert_eq!(note_date_label(&utc("2026-03-05T00:01:00Z"), &now), "today");
    }

    #[test]
    fn test_previous_calendar_day_is_yesterday() {
        let now = utc("2026-03-05T00:10:00Z");
        assert_eq!(note_date_label(&utc("2026-03-04T23:50:00Z"), &now), "yesterday");
    }

    #[test]
    fn test_older_dates_use_month_and_day() {
        let now = utc("2026-03-05T12:00:00Z");
        assert_eq!(note_date_label(&utc("2026-02-17T12:00:00Z"), &now), "Feb 17");
        assert_eq!(note_date_label(&utc("2025-12-01T08:00:00Z"), &now), "Dec 1");
    }

    #[test]
    fn test_last_edited_label_format() {
        assert_eq!(
            last_edited_label(&utc("2026-03-05T15:07:00Z")),
            "March 5, 2026 at 3:07pm"
        );
        assert_eq!(
            last_edited_label(&utc("2026-11-20T00:30:00Z")),
            "November 20, 2026 at 12:30am"
        );
    }
}
