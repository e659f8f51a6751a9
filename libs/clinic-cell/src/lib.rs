pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod settings;

pub use models::*;
pub use router::create_clinic_router;
pub use settings::*;
