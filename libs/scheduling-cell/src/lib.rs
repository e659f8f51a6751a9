pub mod services;

pub use services::jobs::{DailyDigestJob, PatientFormJob, PendingReviewJob, VisibilityJob};
pub use services::registry::{JobCadence, JobReport, JobScheduler, ScheduledJob};
