pub mod queries;
pub mod visibility;

pub use queries::AppointmentQueryService;
pub use visibility::AutoAssignmentVisibilityService;
