pub mod analytics_service;
pub mod flock_service;
pub mod import_export_service;
pub mod income_service;
pub mod stats_service;

pub use flock_service::*;
pub use stats_service::*;
