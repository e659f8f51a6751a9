//! Clinic-local time arithmetic. Calendar fields (`date`, `start_time`,
//! `end_time`) are stored timezone-naive and interpreted as Taiwan local
//! time (UTC+8, no daylight saving).

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

const TAIPEI_OFFSET_SECONDS: i32 = 8 * 3600;

pub fn taipei_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIPEI_OFFSET_SECONDS).unwrap()
}

pub fn now_taipei(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&taipei_offset())
}

/// Interpret a naive clinic-local date + time as a UTC instant.
pub fn taipei_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(date.and_time(time) - Duration::seconds(TAIPEI_OFFSET_SECONDS as i64)))
}

/// The clinic-local calendar date of "tomorrow" relative to a UTC instant.
pub fn tomorrow_taipei(now: DateTime<Utc>) -> NaiveDate {
    now_taipei(now).date_naive() + Duration::days(1)
}

pub fn zh_weekday(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "一",
        Weekday::Tue => "二",
        Weekday::Wed => "三",
        Weekday::Thu => "四",
        Weekday::Fri => "五",
        Weekday::Sat => "六",
        Weekday::Sun => "日",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taipei_conversion_is_minus_eight_hours() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let utc = taipei_to_utc(date, time);
        assert_eq!(utc.to_rfc3339(), "2026-08-06T01:30:00+00:00");
    }

    #[test]
    fn taipei_midnight_crosses_to_previous_utc_day() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let utc = taipei_to_utc(date, time);
        assert_eq!(utc.to_rfc3339(), "2026-08-05T22:00:00+00:00");
    }

    #[test]
    fn weekday_formatting() {
        // 2026-08-06 is a Thursday
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(zh_weekday(date), "四");
    }
}
