use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use appointment_cell::services::AppointmentQueryService;
use appointment_cell::AppointmentWithEvent;
use clinic_cell::services::ClinicDirectoryService;
use clinic_cell::Clinic;
use notification_cell::services::templates::{
    format_clinic_date, format_clinic_time, render_template, DAILY_DIGEST_HEADER_TEMPLATE,
};
use notification_cell::services::LineClient;
use shared_config::AppConfig;
use shared_utils::time::{now_taipei, tomorrow_taipei};

/// Hard cap on enumerated appointments per digest message; the remainder is
/// summarized as a trailing count rather than silently dropped.
pub const DIGEST_MAX_LINES: usize = 50;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DigestRunSummary {
    pub clinics_processed: usize,
    pub sent: usize,
    pub skipped: usize,
}

/// Once per day, per recipient, at their configured local hour: a rollup of
/// tomorrow's confirmed appointments. Admins get the whole clinic grouped
/// by practitioner; practitioners get their own schedule.
///
/// Matching is a coarse hour bucket. A tick that lands in a different hour
/// simply misses the window until the next calendar day; within one day the
/// same recipient can never match twice.
pub struct DailyDigestService {
    directory: ClinicDirectoryService,
    queries: AppointmentQueryService,
    line: LineClient,
}

impl DailyDigestService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            directory: ClinicDirectoryService::new(config),
            queries: AppointmentQueryService::new(config),
            line: LineClient::new(config),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> DigestRunSummary {
        let mut summary = DigestRunSummary::default();
        let current_hour = now_taipei(now).hour();
        let target_date = tomorrow_taipei(now);

        let clinics = match self.directory.list_active_clinics(None).await {
            Ok(clinics) => clinics,
            Err(e) => {
                error!("Digest run aborted, cannot list clinics: {}", e);
                return summary;
            }
        };

        for clinic in clinics {
            summary.clinics_processed += 1;
            if let Err(e) = self
                .run_for_clinic(&clinic, current_hour, target_date, &mut summary)
                .await
            {
                error!("Digest run failed for clinic {}: {}", clinic.id, e);
            }
        }

        info!(
            "Digest run complete: {} clinics, {} sent, {} skipped",
            summary.clinics_processed, summary.sent, summary.skipped
        );
        summary
    }

    async fn run_for_clinic(
        &self,
        clinic: &Clinic,
        current_hour: u32,
        target_date: NaiveDate,
        summary: &mut DigestRunSummary,
    ) -> Result<(), String> {
        let Some(channel_token) = clinic.line_channel_access_token.as_deref() else {
            warn!("Clinic {} has no LINE channel token, digests dropped", clinic.id);
            return Ok(());
        };

        let associations = self
            .directory
            .list_active_associations(clinic.id, None)
            .await
            .map_err(|e| e.to_string())?;

        let recipients: Vec<_> = associations
            .iter()
            .filter(|a| a.line_user_id.is_some())
            .filter(|a| {
                let settings = a.get_validated_settings();
                settings.daily_reminder_enabled && settings.reminder_hour() == current_hour
            })
            .collect();

        if recipients.is_empty() {
            return Ok(());
        }

        let appointments = self
            .queries
            .confirmed_on_date(clinic.id, target_date, None)
            .await
            .map_err(|e| e.to_string())?;

        let practitioner_names: HashMap<Uuid, String> = associations
            .iter()
            .map(|a| (a.user_id, a.display_name.clone()))
            .collect();

        for recipient in recipients {
            let message = if recipient.is_admin() {
                build_admin_digest(clinic, target_date, &appointments, &practitioner_names)
            } else {
                let own: Vec<&AppointmentWithEvent> = appointments
                    .iter()
                    .filter(|a| a.calendar_event.practitioner_id == Some(recipient.user_id))
                    .collect();
                build_practitioner_digest(clinic, target_date, &own)
            };

            let Some(message) = message else {
                summary.skipped += 1;
                continue;
            };
            let Some(line_user_id) = recipient.line_user_id.as_deref() else {
                summary.skipped += 1;
                continue;
            };

            match self
                .line
                .send_text_message(channel_token, line_user_id, &message)
                .await
            {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    error!(
                        "Digest to {} in clinic {} failed: {}",
                        recipient.display_name, clinic.id, e
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(())
    }
}

fn digest_header(clinic: &Clinic, date: NaiveDate) -> String {
    let mut values = HashMap::new();
    values.insert("診所名稱".to_string(), clinic.name.clone());
    values.insert("預約日期".to_string(), format_clinic_date(date));
    render_template(DAILY_DIGEST_HEADER_TEMPLATE, &values)
}

fn appointment_line(appointment: &AppointmentWithEvent) -> String {
    format!(
        "- {} {} {}",
        format_clinic_time(appointment.calendar_event.start_time),
        appointment.patient_name(),
        appointment.type_name()
    )
}

/// Whole-clinic rollup grouped by practitioner, capped at
/// [`DIGEST_MAX_LINES`] enumerated appointments with a trailing remainder
/// count. `None` when there is nothing to report.
pub fn build_admin_digest(
    clinic: &Clinic,
    date: NaiveDate,
    appointments: &[AppointmentWithEvent],
    practitioner_names: &HashMap<Uuid, String>,
) -> Option<String> {
    if appointments.is_empty() {
        return None;
    }

    let mut by_practitioner: BTreeMap<String, Vec<&AppointmentWithEvent>> = BTreeMap::new();
    for appointment in appointments {
        let name = appointment
            .calendar_event
            .practitioner_id
            .and_then(|id| practitioner_names.get(&id).cloned())
            .unwrap_or_else(|| "未指定".to_string());
        by_practitioner.entry(name).or_default().push(appointment);
    }

    let mut message = digest_header(clinic, date);
    let mut enumerated = 0usize;

    'groups: for (name, group) in &by_practitioner {
        message.push_str(&format!("\n\n{}:", name));
        for appointment in group {
            if enumerated >= DIGEST_MAX_LINES {
                break 'groups;
            }
            message.push('\n');
            message.push_str(&appointment_line(appointment));
            enumerated += 1;
        }
    }

    let remainder = appointments.len().saturating_sub(enumerated);
    if remainder > 0 {
        message.push_str(&format!("\n\n……還有 {} 筆預約", remainder));
    }

    Some(message)
}

/// One practitioner's own schedule for the day. `None` when they have no
/// appointments, so nobody gets an empty digest.
pub fn build_practitioner_digest(
    clinic: &Clinic,
    date: NaiveDate,
    appointments: &[&AppointmentWithEvent],
) -> Option<String> {
    if appointments.is_empty() {
        return None;
    }

    let mut message = digest_header(clinic, date);
    message.push('\n');
    for appointment in appointments {
        message.push('\n');
        message.push_str(&appointment_line(appointment));
    }

    Some(message)
}
