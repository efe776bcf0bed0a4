//! Domain models for tripledger.

pub mod entry;
pub mod vehicle;

pub use entry::{DailyBreakdown, DailyEntry};
pub use vehicle::VehicleSettings;
