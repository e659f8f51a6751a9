pub mod forms;

pub use forms::{compute_send_time, PatientFormService};
