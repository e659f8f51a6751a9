use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::settings::{BookingRestrictionPolicy, BookingRestrictionSettings, NotificationSettings};

/// Tenant root. Every selector in the system is scoped by `clinic_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub line_channel_access_token: Option<String>,
    #[serde(default)]
    pub booking_restriction_settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Clinic {
    /// Typed view of the booking-restriction JSON blob. Malformed settings
    /// degrade to the default policy with a warning, never an error.
    pub fn get_validated_settings(&self) -> BookingRestrictionPolicy {
        BookingRestrictionSettings::from_value(&self.booking_restriction_settings).validated()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClinicRole {
    Admin,
    Practitioner,
}

impl fmt::Display for ClinicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClinicRole::Admin => write!(f, "admin"),
            ClinicRole::Practitioner => write!(f, "practitioner"),
        }
    }
}

/// Membership of a staff user in one clinic, with per-user notification
/// preferences stored as JSON and merged (not replaced) on partial update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClinicAssociation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub display_name: String,
    pub line_user_id: Option<String>,
    pub roles: Vec<ClinicRole>,
    #[serde(default)]
    pub notification_settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserClinicAssociation {
    pub fn get_validated_settings(&self) -> NotificationSettings {
        NotificationSettings::from_value(&self.notification_settings)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&ClinicRole::Admin)
    }

    pub fn is_practitioner(&self) -> bool {
        self.roles.contains(&ClinicRole::Practitioner)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Association not found")]
    AssociationNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
