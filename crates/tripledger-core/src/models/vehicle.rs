use serde::{Deserialize, Serialize};

/// One-time vehicle profile used to derive daily figures.
///
/// All currency amounts are in rupees. `emi`, `driver_salary` and
/// `maintenance` are monthly totals and get divided down to a per-day
/// figure by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    /// Fuel efficiency in km per litre
    pub mileage_kmpl: f64,
    /// Earnings per km driven
    pub rate_per_km: f64,
    /// Fuel price per litre
    pub fuel_price: f64,
    /// Monthly vehicle loan installment
    pub emi: f64,
    /// Monthly driver salary
    pub driver_salary: f64,
    /// Monthly maintenance budget
    pub maintenance: f64,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            mileage_kmpl: 15.0,
            rate_per_km: 16.0,
            fuel_price: 100.0,
            emi: 20000.0,
            driver_salary: 23000.0,
            maintenance: 2000.0,
        }
    }
}
