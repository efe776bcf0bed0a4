//! Daily profit calculation.
//!
//! Pure arithmetic over the vehicle profile: income from distance driven,
//! fuel burn from mileage, and monthly fixed costs prorated per day.

use crate::models::{DailyBreakdown, VehicleSettings};

/// Days used to prorate monthly fixed costs into a per-day figure.
const DAYS_PER_MONTH: f64 = 30.0;

/// Derive income, fuel cost, fixed cost and profit for one day of driving.
pub fn daily_breakdown(kms: f64, settings: &VehicleSettings) -> DailyBreakdown {
    let income = kms * settings.rate_per_km;
    let fuel_cost = (kms / settings.mileage_kmpl) * settings.fuel_price;
    let fixed_per_day = (settings.emi + settings.driver_salary + settings.maintenance) / DAYS_PER_MONTH;
    let profit = income - (fuel_cost + fixed_per_day);

    DailyBreakdown {
        kms: kms.round() as i64,
        income: income.round() as i64,
        fuel_cost: fuel_cost.round() as i64,
        fixed_expenses_per_day: fixed_per_day.round() as i64,
        profit: profit.round() as i64,
    }
}
