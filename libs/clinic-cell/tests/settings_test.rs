use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;

use clinic_cell::settings::{
    BookingRestrictionMode, BookingRestrictionPolicy, BookingRestrictionSettings,
    BookingRestrictionSettingsPatch, NotificationSettings, NotificationSettingsPatch,
    DEFAULT_MINIMUM_BOOKING_HOURS, DEFAULT_REMINDER_HOUR,
};

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

// ==============================================================================
// BOOKING RESTRICTION PARSING AND MERGE
// ==============================================================================

#[test]
fn null_settings_fall_back_to_default_minimum_hours() {
    let settings = BookingRestrictionSettings::from_value(&serde_json::Value::Null);
    assert_eq!(
        settings.validated(),
        BookingRestrictionPolicy::MinimumHours {
            hours: DEFAULT_MINIMUM_BOOKING_HOURS
        }
    );
}

#[test]
fn malformed_settings_fall_back_to_default() {
    let settings = BookingRestrictionSettings::from_value(&json!({"mode": 42}));
    assert_eq!(
        settings.validated(),
        BookingRestrictionPolicy::MinimumHours {
            hours: DEFAULT_MINIMUM_BOOKING_HOURS
        }
    );
}

#[test]
fn malformed_deadline_time_falls_back_to_default_deadline() {
    let settings = BookingRestrictionSettings::from_value(&json!({
        "mode": "deadline",
        "deadline_time_day_before": "late evening",
    }));
    assert_eq!(
        settings.validated(),
        BookingRestrictionPolicy::DayBeforeDeadline {
            deadline: time("21:00"),
            on_same_day: false,
        }
    );
}

#[test]
fn merge_applies_patched_fields_and_keeps_the_rest() {
    let current = BookingRestrictionSettings {
        mode: BookingRestrictionMode::MinimumHours,
        minimum_booking_hours_ahead: Some(48),
        deadline_time_day_before: None,
        deadline_on_same_day: None,
    };
    let patch = BookingRestrictionSettingsPatch {
        mode: Some(BookingRestrictionMode::Deadline),
        deadline_time_day_before: Some("08:00".to_string()),
        ..Default::default()
    };

    let merged = current.merged_with(&patch);

    assert_eq!(merged.mode, BookingRestrictionMode::Deadline);
    assert_eq!(merged.deadline_time_day_before.as_deref(), Some("08:00"));
    // Untouched field survives the partial update
    assert_eq!(merged.minimum_booking_hours_ahead, Some(48));
}

// ==============================================================================
// REVEAL-TIME BOUNDARIES
// ==============================================================================

#[test]
fn minimum_hours_boundary_is_inclusive() {
    let policy = BookingRestrictionPolicy::MinimumHours { hours: 24 };
    // now = 2026-08-06 10:00 Taipei
    let now = utc("2026-08-06T02:00:00Z");

    // Start exactly 24h out: due.
    assert!(policy.is_due(now, date("2026-08-07"), time("10:00")));
    // One minute past the boundary: not due.
    assert!(!policy.is_due(now, date("2026-08-07"), time("10:01")));
    // Well inside the window: due.
    assert!(policy.is_due(now, date("2026-08-06"), time("11:00")));
}

#[test]
fn day_before_deadline_boundary() {
    let policy = BookingRestrictionPolicy::DayBeforeDeadline {
        deadline: time("08:00"),
        on_same_day: false,
    };
    let appointment_date = date("2026-08-07");

    // Reveal opens at 2026-08-06 08:00 Taipei == 2026-08-06 00:00 UTC,
    // regardless of the appointment's start time.
    let reveal = policy.reveal_time(appointment_date, time("15:00"));
    assert_eq!(reveal, utc("2026-08-06T00:00:00Z"));

    assert!(policy.is_due(utc("2026-08-06T00:00:00Z"), appointment_date, time("15:00")));
    assert!(!policy.is_due(utc("2026-08-05T23:59:59Z"), appointment_date, time("15:00")));
}

#[test]
fn same_day_deadline_uses_the_appointment_date() {
    let policy = BookingRestrictionPolicy::DayBeforeDeadline {
        deadline: time("08:00"),
        on_same_day: true,
    };
    let reveal = policy.reveal_time(date("2026-08-07"), time("15:00"));
    assert_eq!(reveal, utc("2026-08-07T00:00:00Z"));
}

// ==============================================================================
// NOTIFICATION PREFERENCES
// ==============================================================================

#[test]
fn reminder_hour_parses_configured_time() {
    let settings = NotificationSettings {
        daily_reminder_time: "07:30".to_string(),
        ..Default::default()
    };
    assert_eq!(settings.reminder_hour(), 7);
}

#[test]
fn reminder_hour_falls_back_on_malformed_time() {
    let settings = NotificationSettings {
        daily_reminder_time: "8:30am".to_string(),
        ..Default::default()
    };
    assert_eq!(settings.reminder_hour(), DEFAULT_REMINDER_HOUR);
}

#[test]
fn notification_settings_merge_is_partial() {
    let current = NotificationSettings {
        daily_reminder_enabled: true,
        daily_reminder_time: "09:00".to_string(),
        ..Default::default()
    };
    let patch = NotificationSettingsPatch {
        daily_reminder_enabled: Some(false),
        ..Default::default()
    };

    let merged = current.merged_with(&patch);

    assert!(!merged.daily_reminder_enabled);
    assert_eq!(merged.daily_reminder_time, "09:00");
}
