pub mod directory;

pub use directory::ClinicDirectoryService;
