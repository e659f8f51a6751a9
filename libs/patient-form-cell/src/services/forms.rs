use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use appointment_cell::services::AppointmentQueryService;
use appointment_cell::{AppointmentError, AppointmentStatus, AppointmentWithEvent};
use clinic_cell::services::ClinicDirectoryService;
use notification_cell::services::templates::{
    appointment_context, render_template, PATIENT_FORM_BUTTON_LABEL,
    PATIENT_FORM_MESSAGE_TEMPLATE,
};
use notification_cell::services::{LineClient, ScheduledMessageService};
use notification_cell::{
    MessageType, NewScheduledLineMessage, ScheduledLineMessage, ScheduledMessageStatus,
};
use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_utils::time::taipei_to_utc;

use crate::models::{
    FormRunSummary, FormScheduleOutcome, FormTiming, ImpossiblePolicy, MedicalRecord,
    MedicalRecordTemplate, PatientFormConfig, PatientFormError, ProcessOutcome,
};

/// Target send instant for one form config against one appointment slot.
/// `None` means the config is misconfigured (neither an hour offset nor a
/// specific time).
pub fn compute_send_time(
    config: &PatientFormConfig,
    date: NaiveDate,
    start_time: NaiveTime,
) -> Option<DateTime<Utc>> {
    let start_utc = taipei_to_utc(date, start_time);
    let days = Duration::days(config.days_offset.unwrap_or(0));

    match (config.timing, config.hours_offset, config.specific_time) {
        (FormTiming::Before, Some(hours), _) => Some(start_utc - Duration::hours(hours)),
        (FormTiming::After, Some(hours), _) => Some(start_utc + Duration::hours(hours)),
        (FormTiming::Before, None, Some(time)) => Some(taipei_to_utc(date - days, time)),
        (FormTiming::After, None, Some(time)) => Some(taipei_to_utc(date + days, time)),
        _ => None,
    }
}

/// Schedules and delivers patient intake-form links around appointments.
///
/// Delivery follows commit-before-send: the MedicalRecord (and the audit
/// trail in the queue row) is committed before the LINE push, so a crash or
/// API failure can only lose the message, never the record. De-duplication
/// on `(appointment_id, template_id)` makes reprocessing safe.
pub struct PatientFormService {
    supabase: Arc<SupabaseClient>,
    queries: AppointmentQueryService,
    directory: ClinicDirectoryService,
    outbox: ScheduledMessageService,
    line: LineClient,
    form_base_url: String,
}

impl PatientFormService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            queries: AppointmentQueryService::new(config),
            directory: ClinicDirectoryService::new(config),
            outbox: ScheduledMessageService::new(config),
            line: LineClient::new(config),
            form_base_url: config.public_form_base_url.clone(),
        }
    }

    // ==========================================================================
    // SCHEDULING (invoked from appointment lifecycle hooks)
    // ==========================================================================

    /// Enter the state machine for every active form config of the
    /// appointment's type. Per-config failures are logged and reported as
    /// skipped; the appointment itself is already committed and must not be
    /// affected by scheduling problems.
    pub async fn schedule_for_appointment(
        &self,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<FormScheduleOutcome>, PatientFormError> {
        let appointment = self.queries.get_with_event(appointment_id, None).await?;
        if appointment.appointment.status != AppointmentStatus::Confirmed {
            return Ok(vec![FormScheduleOutcome::Skipped {
                reason: "appointment is not confirmed".to_string(),
            }]);
        }

        let configs = self
            .form_configs(
                appointment.appointment.clinic_id,
                appointment.appointment.appointment_type_id,
            )
            .await?;

        let mut outcomes = Vec::with_capacity(configs.len());
        for config in &configs {
            match self.schedule_one(&appointment, config, now).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(
                        "Form config {} for appointment {} could not be scheduled: {}",
                        config.id, appointment_id, e
                    );
                    outcomes.push(FormScheduleOutcome::Skipped {
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcomes)
    }

    async fn schedule_one(
        &self,
        appointment: &AppointmentWithEvent,
        config: &PatientFormConfig,
        now: DateTime<Utc>,
    ) -> Result<FormScheduleOutcome, PatientFormError> {
        let event = &appointment.calendar_event;

        // A retroactively recorded visit never gets a surprise form.
        if appointment.start_time_utc() <= now {
            self.insert_message(appointment, config, now, ScheduledMessageStatus::Skipped,
                Some("appointment already started"))
                .await?;
            return Ok(FormScheduleOutcome::Skipped {
                reason: "appointment already started".to_string(),
            });
        }

        let Some(send_at) = compute_send_time(config, event.date, event.start_time) else {
            warn!(
                "Form config {} has neither an hour offset nor a specific time",
                config.id
            );
            self.insert_message(appointment, config, now, ScheduledMessageStatus::Skipped,
                Some("form config has no send time"))
                .await?;
            return Ok(FormScheduleOutcome::Skipped {
                reason: "form config has no send time".to_string(),
            });
        };

        if send_at <= now && config.timing == FormTiming::Before {
            return match config.on_impossible {
                ImpossiblePolicy::SendImmediately => {
                    let message = self
                        .insert_message(appointment, config, now, ScheduledMessageStatus::Pending, None)
                        .await?;
                    match self.process_message(&message, now).await? {
                        ProcessOutcome::Sent => Ok(FormScheduleOutcome::SentImmediately),
                        ProcessOutcome::Skipped => Ok(FormScheduleOutcome::Skipped {
                            reason: "immediate send skipped".to_string(),
                        }),
                    }
                }
                ImpossiblePolicy::Skip => {
                    self.insert_message(appointment, config, now, ScheduledMessageStatus::Skipped,
                        Some("send time already past"))
                        .await?;
                    Ok(FormScheduleOutcome::Skipped {
                        reason: "send time already past".to_string(),
                    })
                }
            };
        }

        // Future send time (the only reachable case for `after` forms on an
        // upcoming appointment): park a durable pending row.
        self.insert_message(appointment, config, send_at, ScheduledMessageStatus::Pending, None)
            .await?;
        Ok(FormScheduleOutcome::Scheduled { send_at })
    }

    /// All pending forms for a canceled appointment become skipped; sent
    /// ones are history and stay untouched.
    pub async fn cancel_forms_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<(), PatientFormError> {
        self.outbox
            .skip_pending_for_appointment(appointment_id, "appointment canceled")
            .await?;
        Ok(())
    }

    /// On a time edit: skip whatever is still pending, then re-enter the
    /// state machine from the top. Already-sent forms are protected from
    /// duplication by the medical-record lookup at send time.
    pub async fn reschedule_forms_for_appointment(
        &self,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<FormScheduleOutcome>, PatientFormError> {
        self.outbox
            .skip_pending_for_appointment(appointment_id, "appointment time changed")
            .await?;
        self.schedule_for_appointment(appointment_id, now).await
    }

    // ==========================================================================
    // PROCESSING (cron-driven)
    // ==========================================================================

    /// One processing pass over the due pending queue. A failing message is
    /// logged and counted; it never stops the run.
    pub async fn process_due(&self, now: DateTime<Utc>) -> FormRunSummary {
        let mut summary = FormRunSummary::default();

        let due = match self.outbox.due_pending(now, MessageType::PatientForm).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Cannot fetch due patient-form messages: {}", e);
                summary.errors += 1;
                return summary;
            }
        };

        for message in due {
            summary.processed += 1;
            match self.process_message(&message, now).await {
                Ok(ProcessOutcome::Sent) => summary.sent += 1,
                Ok(ProcessOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!("Patient-form message {} failed: {}", message.id, e);
                    summary.errors += 1;
                }
            }
        }

        info!(
            "Patient-form run complete: {} processed, {} sent, {} skipped, {} errors",
            summary.processed, summary.sent, summary.skipped, summary.errors
        );
        summary
    }

    /// Process one queued form message. The MedicalRecord lookup keyed by
    /// `(appointment_id, template_id)` makes this idempotent: a message
    /// reprocessed after a crash reuses the committed record.
    pub async fn process_message(
        &self,
        message: &ScheduledLineMessage,
        _now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, PatientFormError> {
        let Some(appointment_id) = message.context_id("appointment_id") else {
            self.outbox
                .mark_skipped(message.id, "message context has no appointment_id")
                .await?;
            return Ok(ProcessOutcome::Skipped);
        };
        let Some(template_id) = message.context_id("medical_record_template_id") else {
            self.outbox
                .mark_skipped(message.id, "message context has no medical_record_template_id")
                .await?;
            return Ok(ProcessOutcome::Skipped);
        };

        let appointment = match self.queries.get_with_event(appointment_id, None).await {
            Ok(appointment) => appointment,
            Err(AppointmentError::NotFound) => {
                self.outbox.mark_skipped(message.id, "appointment not found").await?;
                return Ok(ProcessOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        if appointment.appointment.status != AppointmentStatus::Confirmed {
            self.outbox.mark_skipped(message.id, "appointment canceled").await?;
            return Ok(ProcessOutcome::Skipped);
        }

        let Some(line_user_id) = appointment
            .patient
            .as_ref()
            .and_then(|p| p.line_user_id.clone())
        else {
            self.outbox
                .mark_skipped(message.id, "patient has no LINE account")
                .await?;
            return Ok(ProcessOutcome::Skipped);
        };

        let clinic = self
            .directory
            .get_clinic(appointment.appointment.clinic_id, None)
            .await
            .map_err(|e| PatientFormError::DatabaseError(e.to_string()))?;

        let Some(template) = self.get_template(template_id).await? else {
            self.outbox
                .mark_skipped(message.id, "medical record template not found")
                .await?;
            return Ok(ProcessOutcome::Skipped);
        };

        // Committed before the send, and reused on any retry.
        let record = self.find_or_create_record(&appointment, template_id).await?;
        self.outbox.attach_medical_record(message, record.id).await?;

        let Some(channel_token) = clinic.line_channel_access_token.clone() else {
            self.outbox
                .mark_skipped(message.id, "clinic has no LINE channel token")
                .await?;
            return Ok(ProcessOutcome::Skipped);
        };

        let event = &appointment.calendar_event;
        let mut values = appointment_context(
            &clinic,
            appointment.patient_name(),
            "",
            appointment.type_name(),
            event.date,
            event.start_time,
            appointment.duration_minutes(),
        );
        values.insert("表單名稱".to_string(), template.name.clone());
        let text = render_template(PATIENT_FORM_MESSAGE_TEMPLATE, &values);
        let form_url = format!("{}/medical-records/{}", self.form_base_url, record.id);

        match self
            .line
            .send_button_template(
                &channel_token,
                &line_user_id,
                &format!("請填寫「{}」", template.name),
                &text,
                PATIENT_FORM_BUTTON_LABEL,
                &form_url,
            )
            .await
        {
            Ok(()) => {
                self.outbox.mark_sent(message.id).await?;
                Ok(ProcessOutcome::Sent)
            }
            Err(e) => {
                // The record above is already durable; only the message's
                // own outcome is affected.
                warn!("Patient-form push for message {} failed: {}", message.id, e);
                self.outbox
                    .mark_skipped(message.id, &format!("send failed: {}", e))
                    .await?;
                Ok(ProcessOutcome::Skipped)
            }
        }
    }

    // ==========================================================================
    // PERSISTENCE HELPERS
    // ==========================================================================

    async fn form_configs(
        &self,
        clinic_id: Uuid,
        appointment_type_id: Uuid,
    ) -> Result<Vec<PatientFormConfig>, PatientFormError> {
        let path = format!(
            "/rest/v1/patient_form_configs?clinic_id=eq.{}&appointment_type_id=eq.{}&is_active=eq.true&order=id.asc",
            clinic_id, appointment_type_id
        );
        self.supabase
            .service_request(Method::GET, &path, None)
            .await
            .map_err(|e| PatientFormError::DatabaseError(e.to_string()))
    }

    async fn insert_message(
        &self,
        appointment: &AppointmentWithEvent,
        config: &PatientFormConfig,
        scheduled_send_time: DateTime<Utc>,
        status: ScheduledMessageStatus,
        error_reason: Option<&str>,
    ) -> Result<ScheduledLineMessage, PatientFormError> {
        let message = NewScheduledLineMessage {
            clinic_id: appointment.appointment.clinic_id,
            message_type: MessageType::PatientForm,
            message_context: json!({
                "appointment_id": appointment.appointment.id,
                "patient_form_config_id": config.id,
                "medical_record_template_id": config.medical_record_template_id,
            }),
            scheduled_send_time,
            status,
            error_reason: error_reason.map(|r| r.to_string()),
        };
        Ok(self.outbox.schedule(&message).await?)
    }

    async fn get_template(
        &self,
        template_id: Uuid,
    ) -> Result<Option<MedicalRecordTemplate>, PatientFormError> {
        let path = format!("/rest/v1/medical_record_templates?id=eq.{}", template_id);
        let rows: Vec<MedicalRecordTemplate> = self
            .supabase
            .service_request(Method::GET, &path, None)
            .await
            .map_err(|e| PatientFormError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn find_or_create_record(
        &self,
        appointment: &AppointmentWithEvent,
        template_id: Uuid,
    ) -> Result<MedicalRecord, PatientFormError> {
        let path = format!(
            "/rest/v1/medical_records?appointment_id=eq.{}&template_id=eq.{}",
            appointment.appointment.id, template_id
        );
        let existing: Vec<MedicalRecord> = self
            .supabase
            .service_request(Method::GET, &path, None)
            .await
            .map_err(|e| PatientFormError::DatabaseError(e.to_string()))?;

        if let Some(record) = existing.into_iter().next() {
            return Ok(record);
        }

        let body = json!({
            "clinic_id": appointment.appointment.clinic_id,
            "appointment_id": appointment.appointment.id,
            "template_id": template_id,
            "created_at": Utc::now().to_rfc3339(),
        });
        let rows: Vec<MedicalRecord> = self
            .supabase
            .service_request_with_headers(
                Method::POST,
                "/rest/v1/medical_records",
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientFormError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or_else(|| {
            PatientFormError::DatabaseError("medical record insert returned no row".to_string())
        })
    }
}
