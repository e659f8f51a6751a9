pub mod daily_digest;
pub mod jobs;
pub mod pending_review;
pub mod registry;

pub use daily_digest::DailyDigestService;
pub use pending_review::PendingReviewService;
