//! The cron jobs: thin [`ScheduledJob`] wrappers that hand the tick time to
//! the owning service and summarize its run report.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use appointment_cell::services::AutoAssignmentVisibilityService;
use patient_form_cell::services::PatientFormService;

use crate::services::daily_digest::DailyDigestService;
use crate::services::pending_review::PendingReviewService;
use crate::services::registry::{JobCadence, JobReport, ScheduledJob};

/// Hourly visibility transition for auto-assigned appointments, with an
/// eager run at startup to catch transitions missed while down.
pub struct VisibilityJob {
    service: Arc<AutoAssignmentVisibilityService>,
}

impl VisibilityJob {
    pub fn new(service: Arc<AutoAssignmentVisibilityService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for VisibilityJob {
    fn name(&self) -> &'static str {
        "auto_assignment_visibility"
    }

    fn cadence(&self) -> JobCadence {
        JobCadence::HourlyAt { minute: 0 }
    }

    fn run_on_startup(&self) -> bool {
        true
    }

    async fn run(&self, now: DateTime<Utc>) -> JobReport {
        let summary = self.service.run(now).await;
        JobReport {
            summary: format!(
                "{} clinics, {} revealed, {} not yet due, {} errors",
                summary.clinics_processed, summary.revealed, summary.not_yet_due, summary.errors
            ),
        }
    }
}

pub struct DailyDigestJob {
    service: Arc<DailyDigestService>,
}

impl DailyDigestJob {
    pub fn new(service: Arc<DailyDigestService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for DailyDigestJob {
    fn name(&self) -> &'static str {
        "daily_digest"
    }

    fn cadence(&self) -> JobCadence {
        JobCadence::HourlyAt { minute: 0 }
    }

    async fn run(&self, now: DateTime<Utc>) -> JobReport {
        let summary = self.service.run(now).await;
        JobReport {
            summary: format!(
                "{} clinics, {} sent, {} skipped",
                summary.clinics_processed, summary.sent, summary.skipped
            ),
        }
    }
}

pub struct PendingReviewJob {
    service: Arc<PendingReviewService>,
}

impl PendingReviewJob {
    pub fn new(service: Arc<PendingReviewService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for PendingReviewJob {
    fn name(&self) -> &'static str {
        "pending_review_reminder"
    }

    fn cadence(&self) -> JobCadence {
        JobCadence::HourlyAt { minute: 0 }
    }

    async fn run(&self, now: DateTime<Utc>) -> JobReport {
        let summary = self.service.run(now).await;
        JobReport {
            summary: format!(
                "{} clinics, {} sent, {} skipped",
                summary.clinics_processed, summary.sent, summary.skipped
            ),
        }
    }
}

/// Patient-form queue processing, hourly at :05, plus an eager startup run.
pub struct PatientFormJob {
    service: Arc<PatientFormService>,
}

impl PatientFormJob {
    pub fn new(service: Arc<PatientFormService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for PatientFormJob {
    fn name(&self) -> &'static str {
        "patient_form_queue"
    }

    fn cadence(&self) -> JobCadence {
        JobCadence::HourlyAt { minute: 5 }
    }

    fn run_on_startup(&self) -> bool {
        true
    }

    async fn run(&self, now: DateTime<Utc>) -> JobReport {
        let summary = self.service.process_due(now).await;
        JobReport {
            summary: format!(
                "{} processed, {} sent, {} skipped, {} errors",
                summary.processed, summary.sent, summary.skipped, summary.errors
            ),
        }
    }
}
