//! Local JSON persistence for daily entries and vehicle settings.
//!
//! Simple file-per-record-type stores under the application data
//! directory, separate from the session storage owned by the identity
//! client.

pub mod entries;
pub mod vehicle;

pub use entries::EntryStore;
pub use vehicle::VehicleStore;
