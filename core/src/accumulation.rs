//! Accumulation view: prefix sums of actual, budget and prior-year.
//!
//! Always recomputed from the stored per-month rows; never cached or
//! persisted. A correction to one month therefore can never leave a later
//! month's running total stale.

use crate::{
    store::MonthlyDamageRecord,
    types::{months, Amount, Month, Year, MONTHS_PER_YEAR},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedMonth {
    pub year: Year,
    pub month: Month,
    pub actual_value: Amount,
    pub budget_value: Amount,
    pub prior_year_base_value: Amount,
    pub cumulative_actual: Amount,
    pub cumulative_budget: Amount,
    pub cumulative_prior_year: Amount,
}

/// Twelve months, January first.
pub type AccumulatedYear = [AccumulatedMonth; MONTHS_PER_YEAR as usize];

/// Build the year's running totals from its stored rows.
///
/// Rows for other years are ignored. A month without a reported row counts
/// as zero actual and `fixed_monthly_budget` budget: the budget keeps
/// projecting while the actual does not. Prior-year base is taken from any
/// row, reported or not.
pub fn recompute(year: Year, rows: &[MonthlyDamageRecord], fixed_monthly_budget: Amount) -> AccumulatedYear {
    let mut cumulative_actual = 0;
    let mut cumulative_budget = 0;
    let mut cumulative_prior_year = 0;

    let mut out = [AccumulatedMonth {
        year,
        month: 0,
        actual_value: 0,
        budget_value: 0,
        prior_year_base_value: 0,
        cumulative_actual: 0,
        cumulative_budget: 0,
        cumulative_prior_year: 0,
    }; MONTHS_PER_YEAR as usize];

    for month in months() {
        let row = rows.iter().find(|r| r.year == year && r.month == month);

        let (actual_value, budget_value) = match row {
            Some(r) if r.reported => (r.actual_value.max(0), r.budget_value.max(0)),
            _ => (0, fixed_monthly_budget.max(0)),
        };
        let prior_year_base_value = row.map_or(0, |r| r.prior_year_base_value.max(0));

        // Rows are bounded on write; saturate for anything written around the store.
        cumulative_actual = Amount::saturating_add(cumulative_actual, actual_value);
        cumulative_budget = Amount::saturating_add(cumulative_budget, budget_value);
        cumulative_prior_year = Amount::saturating_add(cumulative_prior_year, prior_year_base_value);

        out[(month - 1) as usize] = AccumulatedMonth {
            year,
            month,
            actual_value,
            budget_value,
            prior_year_base_value,
            cumulative_actual,
            cumulative_budget,
            cumulative_prior_year,
        };
    }
    out
}
