use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use clinic_cell::services::ClinicDirectoryService;
use clinic_cell::settings::AutoAssignedNotificationMode;
use clinic_cell::{Clinic, UserClinicAssociation};
use notification_cell::services::templates::{
    appointment_context, render_template, AUTO_ASSIGNED_REVEAL_TEMPLATE,
};
use notification_cell::services::LineClient;
use shared_config::AppConfig;

use crate::models::{AppointmentError, AppointmentWithEvent, VisibilityRunSummary};
use crate::services::queries::AppointmentQueryService;

/// Flips `is_auto_assigned` once an appointment is inside its clinic's
/// booking-restriction window and pushes a one-time notification to the
/// assigned practitioner and immediate-mode admins.
///
/// The flag flip is committed before any notification attempt, so a failed
/// push never rolls back the transition, and the one-way flag makes every
/// re-run a no-op for already-visible appointments.
pub struct AutoAssignmentVisibilityService {
    directory: ClinicDirectoryService,
    queries: AppointmentQueryService,
    line: LineClient,
}

impl AutoAssignmentVisibilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            directory: ClinicDirectoryService::new(config),
            queries: AppointmentQueryService::new(config),
            line: LineClient::new(config),
        }
    }

    /// One full pass over all active clinics. Never returns an error: a bad
    /// clinic or appointment is logged, counted, and skipped.
    pub async fn run(&self, now: DateTime<Utc>) -> VisibilityRunSummary {
        let mut summary = VisibilityRunSummary::default();

        let clinics = match self.directory.list_active_clinics(None).await {
            Ok(clinics) => clinics,
            Err(e) => {
                error!("Visibility run aborted, cannot list clinics: {}", e);
                summary.errors += 1;
                return summary;
            }
        };

        for clinic in clinics {
            summary.clinics_processed += 1;
            if let Err(e) = self.run_for_clinic(&clinic, now, &mut summary).await {
                error!("Visibility run failed for clinic {}: {}", clinic.id, e);
                summary.errors += 1;
            }
        }

        info!(
            "Visibility run complete: {} clinics, {} revealed, {} not yet due, {} errors",
            summary.clinics_processed, summary.revealed, summary.not_yet_due, summary.errors
        );
        summary
    }

    async fn run_for_clinic(
        &self,
        clinic: &Clinic,
        now: DateTime<Utc>,
        summary: &mut VisibilityRunSummary,
    ) -> Result<(), AppointmentError> {
        let policy = clinic.get_validated_settings();
        let candidates = self.queries.auto_assigned_candidates(clinic.id, None).await?;

        for candidate in candidates {
            let event = &candidate.calendar_event;
            if !policy.is_due(now, event.date, event.start_time) {
                summary.not_yet_due += 1;
                continue;
            }

            match self.process_due_appointment(clinic, &candidate, now).await {
                Ok(true) => summary.revealed += 1,
                Ok(false) => summary.not_yet_due += 1,
                Err(e) => {
                    error!(
                        "Appointment {} in clinic {} stays hidden: {}",
                        candidate.appointment.id, clinic.id, e
                    );
                    summary.errors += 1;
                }
            }
        }

        Ok(())
    }

    async fn process_due_appointment(
        &self,
        clinic: &Clinic,
        candidate: &AppointmentWithEvent,
        now: DateTime<Utc>,
    ) -> Result<bool, AppointmentError> {
        let event = &candidate.calendar_event;

        // Re-verify timing right before mutating; the candidate set was
        // computed earlier in the tick.
        let policy = clinic.get_validated_settings();
        if !policy.is_due(now, event.date, event.start_time) {
            return Ok(false);
        }

        let practitioner_id = event
            .practitioner_id
            .ok_or(AppointmentError::PractitionerNotAssigned)?;

        let association = self
            .directory
            .practitioner_association(clinic.id, practitioner_id, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::PractitionerInactive)?;

        if !association.is_active {
            return Err(AppointmentError::PractitionerInactive);
        }

        // Commit the flag flip first; the notification below is best-effort.
        let revealed = self.queries.reveal(candidate.appointment.id).await?;
        if !revealed {
            debug!(
                "Appointment {} was already visible, nothing to do",
                candidate.appointment.id
            );
            return Ok(false);
        }

        self.notify_reveal(clinic, candidate, &association).await;
        Ok(true)
    }

    /// Push the reveal notification to the practitioner and every
    /// immediate-mode admin. Failures are logged and swallowed; the flag
    /// flip above is already durable.
    async fn notify_reveal(
        &self,
        clinic: &Clinic,
        candidate: &AppointmentWithEvent,
        practitioner: &UserClinicAssociation,
    ) {
        let Some(token) = clinic.line_channel_access_token.as_deref() else {
            warn!(
                "Clinic {} has no LINE channel token, reveal notification dropped",
                clinic.id
            );
            return;
        };

        let event = &candidate.calendar_event;
        let values = appointment_context(
            clinic,
            candidate.patient_name(),
            &practitioner.display_name,
            candidate.type_name(),
            event.date,
            event.start_time,
            candidate.duration_minutes(),
        );
        let text = render_template(AUTO_ASSIGNED_REVEAL_TEMPLATE, &values);

        let admins = match self.directory.list_active_associations(clinic.id, None).await {
            Ok(associations) => associations,
            Err(e) => {
                warn!("Cannot list admins for clinic {}: {}", clinic.id, e);
                Vec::new()
            }
        };

        let mut recipients: Vec<&UserClinicAssociation> = vec![practitioner];
        for admin in admins.iter().filter(|a| a.is_admin() && a.id != practitioner.id) {
            recipients.push(admin);
        }

        for recipient in recipients {
            let settings = recipient.get_validated_settings();
            if settings.auto_assigned_notification_mode != AutoAssignedNotificationMode::Immediate {
                continue;
            }
            let Some(line_user_id) = recipient.line_user_id.as_deref() else {
                continue;
            };

            if let Err(e) = self.line.send_text_message(token, line_user_id, &text).await {
                error!(
                    "Reveal notification for appointment {} to {} failed: {}",
                    candidate.appointment.id, recipient.display_name, e
                );
            }
        }
    }
}
