use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived figures for one day of driving.
///
/// Currency values are rounded to whole rupees at calculation time so that
/// persisted entries match what was shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub kms: i64,
    pub income: i64,
    pub fuel_cost: i64,
    pub fixed_expenses_per_day: i64,
    pub profit: i64,
}

/// A persisted daily record: the derived breakdown plus user-entered extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEntry {
    pub id: String,
    /// Display date, e.g. "31 Oct 2025"
    pub date: String,
    pub kms: i64,
    pub income: i64,
    pub fuel_cost: i64,
    pub fixed_expenses_per_day: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_expenses: Option<i64>,
    pub profit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DailyEntry {
    /// Build an entry from a calculated breakdown with a fresh id.
    /// One-off expenses for the day come out of the profit figure.
    pub fn from_breakdown(
        date: String,
        breakdown: DailyBreakdown,
        extra_expenses: Option<i64>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            kms: breakdown.kms,
            income: breakdown.income,
            fuel_cost: breakdown.fuel_cost,
            fixed_expenses_per_day: breakdown.fixed_expenses_per_day,
            extra_expenses,
            profit: breakdown.profit - extra_expenses.unwrap_or(0),
            notes,
            created_at: Utc::now(),
        }
    }
}
