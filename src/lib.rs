//! flockbook: record keeping for poultry flocks.
//!
//! Tracks daily production stats (eggs harvested, mortality, feed
//! consumed) per flock, derives day numbers, laying percentages and
//! day-to-day deltas, validates every write against the flock's date
//! window and size, and imports/exports stats as CSV.

pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod settings;
pub mod validators;

pub use error::{AppError, FieldError, RowError, ValidationErrors, ViolationKind};
pub use models::{Flock, ImportRow, Stats};
pub use settings::Settings;
