use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use appointment_cell::services::AppointmentQueryService;
use clinic_cell::services::ClinicDirectoryService;
use clinic_cell::Clinic;
use notification_cell::services::templates::{render_template, PENDING_REVIEW_TEMPLATE};
use notification_cell::services::LineClient;
use shared_config::AppConfig;
use shared_utils::time::now_taipei;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingReviewRunSummary {
    pub clinics_processed: usize,
    pub sent: usize,
    pub skipped: usize,
}

/// Reminds admins, at their configured hour, how many confirmed
/// appointments still have an unconfirmed time slot. Structurally the same
/// hourly sweep as the daily digest, with a count query instead of a
/// rollup.
pub struct PendingReviewService {
    directory: ClinicDirectoryService,
    queries: AppointmentQueryService,
    line: LineClient,
}

impl PendingReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            directory: ClinicDirectoryService::new(config),
            queries: AppointmentQueryService::new(config),
            line: LineClient::new(config),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> PendingReviewRunSummary {
        let mut summary = PendingReviewRunSummary::default();
        let current_hour = now_taipei(now).hour();

        let clinics = match self.directory.list_active_clinics(None).await {
            Ok(clinics) => clinics,
            Err(e) => {
                error!("Pending-review run aborted, cannot list clinics: {}", e);
                return summary;
            }
        };

        for clinic in clinics {
            summary.clinics_processed += 1;
            if let Err(e) = self.run_for_clinic(&clinic, current_hour, &mut summary).await {
                error!("Pending-review run failed for clinic {}: {}", clinic.id, e);
            }
        }

        info!(
            "Pending-review run complete: {} clinics, {} sent, {} skipped",
            summary.clinics_processed, summary.sent, summary.skipped
        );
        summary
    }

    async fn run_for_clinic(
        &self,
        clinic: &Clinic,
        current_hour: u32,
        summary: &mut PendingReviewRunSummary,
    ) -> Result<(), String> {
        let Some(channel_token) = clinic.line_channel_access_token.as_deref() else {
            warn!(
                "Clinic {} has no LINE channel token, pending-review reminders dropped",
                clinic.id
            );
            return Ok(());
        };

        let associations = self
            .directory
            .list_active_associations(clinic.id, None)
            .await
            .map_err(|e| e.to_string())?;

        let recipients: Vec<_> = associations
            .iter()
            .filter(|a| a.is_admin() && a.line_user_id.is_some())
            .filter(|a| {
                let settings = a.get_validated_settings();
                settings.pending_review_reminder_enabled
                    && settings.reminder_hour() == current_hour
            })
            .collect();

        if recipients.is_empty() {
            return Ok(());
        }

        let count = self
            .queries
            .pending_confirmation_count(clinic.id, None)
            .await
            .map_err(|e| e.to_string())?;
        if count == 0 {
            return Ok(());
        }

        let mut values = HashMap::new();
        values.insert("診所名稱".to_string(), clinic.name.clone());
        values.insert("待確認數".to_string(), count.to_string());
        let message = render_template(PENDING_REVIEW_TEMPLATE, &values);

        for recipient in recipients {
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
                        "Pending-review reminder to {} in clinic {} failed: {}",
                        recipient.display_name, clinic.id, e
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(())
    }
}
