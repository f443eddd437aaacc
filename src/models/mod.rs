pub mod flock;
pub mod stats;

pub use flock::Flock;
pub use stats::{ImportRow, Stats};
