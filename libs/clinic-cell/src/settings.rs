//! Typed views over the per-clinic and per-user settings JSON blobs.
//!
//! Partial updates are merged field-wise into the existing settings as a
//! pure function; unknown or malformed values degrade to defaults with a
//! warning so that a bad settings row can never take a scheduled job down.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use shared_utils::time::taipei_to_utc;

pub const DEFAULT_MINIMUM_BOOKING_HOURS: i64 = 24;
pub const DEFAULT_DEADLINE_TIME: &str = "21:00";
pub const DEFAULT_REMINDER_HOUR: u32 = 8;

// ==============================================================================
// BOOKING RESTRICTIONS (per clinic)
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingRestrictionMode {
    #[default]
    MinimumHours,
    Deadline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingRestrictionSettings {
    #[serde(default)]
    pub mode: BookingRestrictionMode,
    #[serde(default)]
    pub minimum_booking_hours_ahead: Option<i64>,
    /// "HH:MM", clinic-local.
    #[serde(default)]
    pub deadline_time_day_before: Option<String>,
    #[serde(default)]
    pub deadline_on_same_day: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingRestrictionSettingsPatch {
    pub mode: Option<BookingRestrictionMode>,
    pub minimum_booking_hours_ahead: Option<i64>,
    pub deadline_time_day_before: Option<String>,
    pub deadline_on_same_day: Option<bool>,
}

impl BookingRestrictionSettings {
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("Malformed booking restriction settings ({}), using defaults", e);
            Self::default()
        })
    }

    /// Merge a partial update into the current settings. Fields absent from
    /// the patch keep their current value.
    pub fn merged_with(&self, patch: &BookingRestrictionSettingsPatch) -> Self {
        Self {
            mode: patch.mode.unwrap_or(self.mode),
            minimum_booking_hours_ahead: patch
                .minimum_booking_hours_ahead
                .or(self.minimum_booking_hours_ahead),
            deadline_time_day_before: patch
                .deadline_time_day_before
                .clone()
                .or_else(|| self.deadline_time_day_before.clone()),
            deadline_on_same_day: patch.deadline_on_same_day.or(self.deadline_on_same_day),
        }
    }

    pub fn validated(&self) -> BookingRestrictionPolicy {
        match self.mode {
            BookingRestrictionMode::MinimumHours => {
                let hours = match self.minimum_booking_hours_ahead {
                    Some(h) if h >= 0 => h,
                    Some(h) => {
                        warn!("Negative minimum_booking_hours_ahead {}, using default", h);
                        DEFAULT_MINIMUM_BOOKING_HOURS
                    }
                    None => DEFAULT_MINIMUM_BOOKING_HOURS,
                };
                BookingRestrictionPolicy::MinimumHours { hours }
            }
            BookingRestrictionMode::Deadline => {
                let raw = self
                    .deadline_time_day_before
                    .as_deref()
                    .unwrap_or(DEFAULT_DEADLINE_TIME);
                let deadline = NaiveTime::parse_from_str(raw, "%H:%M").unwrap_or_else(|_| {
                    warn!("Malformed deadline time {:?}, using {}", raw, DEFAULT_DEADLINE_TIME);
                    NaiveTime::parse_from_str(DEFAULT_DEADLINE_TIME, "%H:%M")
                        .expect("default deadline time parses")
                });
                BookingRestrictionPolicy::DayBeforeDeadline {
                    deadline,
                    on_same_day: self.deadline_on_same_day.unwrap_or(false),
                }
            }
        }
    }
}

/// Resolved booking-restriction policy, with the reveal-time math for the
/// auto-assignment visibility transition.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingRestrictionPolicy {
    MinimumHours { hours: i64 },
    DayBeforeDeadline { deadline: NaiveTime, on_same_day: bool },
}

impl BookingRestrictionPolicy {
    /// The UTC instant from which an auto-assigned appointment on
    /// `date`/`start_time` (clinic-local) must be visible to its practitioner.
    pub fn reveal_time(&self, date: NaiveDate, start_time: NaiveTime) -> DateTime<Utc> {
        match self {
            BookingRestrictionPolicy::MinimumHours { hours } => {
                taipei_to_utc(date, start_time) - Duration::hours(*hours)
            }
            BookingRestrictionPolicy::DayBeforeDeadline { deadline, on_same_day } => {
                let deadline_date = if *on_same_day { date } else { date - Duration::days(1) };
                taipei_to_utc(deadline_date, *deadline)
            }
        }
    }

    /// Inclusive at the boundary: an appointment starting exactly at
    /// `now + minimum_hours` is due.
    pub fn is_due(&self, now: DateTime<Utc>, date: NaiveDate, start_time: NaiveTime) -> bool {
        now >= self.reveal_time(date, start_time)
    }
}

// ==============================================================================
// NOTIFICATION PREFERENCES (per user-clinic association)
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoAssignedNotificationMode {
    /// Learn about newly revealed appointments from the daily digest.
    #[default]
    Scheduled,
    /// Push a message the moment the appointment is revealed.
    Immediate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSettings {
    #[serde(default = "default_daily_reminder_enabled")]
    pub daily_reminder_enabled: bool,
    /// "HH:MM", clinic-local hour at which the daily digest is wanted.
    #[serde(default = "default_daily_reminder_time")]
    pub daily_reminder_time: String,
    #[serde(default)]
    pub auto_assigned_notification_mode: AutoAssignedNotificationMode,
    #[serde(default)]
    pub pending_review_reminder_enabled: bool,
}

fn default_daily_reminder_enabled() -> bool {
    true
}

fn default_daily_reminder_time() -> String {
    format!("{:02}:00", DEFAULT_REMINDER_HOUR)
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            daily_reminder_enabled: default_daily_reminder_enabled(),
            daily_reminder_time: default_daily_reminder_time(),
            auto_assigned_notification_mode: AutoAssignedNotificationMode::default(),
            pending_review_reminder_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettingsPatch {
    pub daily_reminder_enabled: Option<bool>,
    pub daily_reminder_time: Option<String>,
    pub auto_assigned_notification_mode: Option<AutoAssignedNotificationMode>,
    pub pending_review_reminder_enabled: Option<bool>,
}

impl NotificationSettings {
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("Malformed notification settings ({}), using defaults", e);
            Self::default()
        })
    }

    pub fn merged_with(&self, patch: &NotificationSettingsPatch) -> Self {
        Self {
            daily_reminder_enabled: patch
                .daily_reminder_enabled
                .unwrap_or(self.daily_reminder_enabled),
            daily_reminder_time: patch
                .daily_reminder_time
                .clone()
                .unwrap_or_else(|| self.daily_reminder_time.clone()),
            auto_assigned_notification_mode: patch
                .auto_assigned_notification_mode
                .unwrap_or(self.auto_assigned_notification_mode),
            pending_review_reminder_enabled: patch
                .pending_review_reminder_enabled
                .unwrap_or(self.pending_review_reminder_enabled),
        }
    }

    /// Hour bucket of the configured reminder time; malformed values warn
    /// and fall back to the default hour rather than dropping the recipient.
    pub fn reminder_hour(&self) -> u32 {
        match NaiveTime::parse_from_str(&self.daily_reminder_time, "%H:%M") {
            Ok(t) => t.hour(),
            Err(_) => {
                warn!(
                    "Malformed daily reminder time {:?}, falling back to {:02}:00",
                    self.daily_reminder_time, DEFAULT_REMINDER_HOUR
                );
                DEFAULT_REMINDER_HOUR
            }
        }
    }
}
