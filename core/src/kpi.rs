//! KPI calculator: year-to-date totals and ratios for the dashboard header.

use crate::{
    horizon::YearHorizon,
    series::{DashboardMonth, DashboardSeries},
    types::{Amount, Month, Year, MONTHS_PER_YEAR},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: Year,
    pub total_actual_to_date: Amount,
    pub total_budget_to_date: Amount,
    pub total_prior_year_to_date: Amount,
    /// actual / budget × 100; 0 when there is no budget to date.
    pub compliance_to_budget_percent: f64,
    /// (actual − prior) / prior × 100; None when there is no prior-year base.
    pub year_over_year_variance_percent: Option<f64>,
}

fn at(series: &DashboardSeries, month: Month, pick: impl Fn(&DashboardMonth) -> Amount) -> Amount {
    match month.min(MONTHS_PER_YEAR) {
        0 => 0,
        m => pick(&series[(m - 1) as usize]),
    }
}

pub fn summarize(series: &DashboardSeries, horizon: &YearHorizon) -> YearSummary {
    let h = horizon.horizon_month;

    let total_actual_to_date = at(series, h, |m| m.cumulative_actual);
    // Any year other than the current one uses the full-year plan.
    let budget_month = if horizon.is_current_year { h } else { MONTHS_PER_YEAR };
    let total_budget_to_date = at(series, budget_month, |m| m.cumulative_budget);
    let total_prior_year_to_date = at(series, h, |m| m.cumulative_prior_year);

    YearSummary {
        year: horizon.year,
        total_actual_to_date,
        total_budget_to_date,
        total_prior_year_to_date,
        compliance_to_budget_percent: compliance_percent(total_actual_to_date, total_budget_to_date),
        year_over_year_variance_percent: variance_percent(total_actual_to_date, total_prior_year_to_date),
    }
}

pub fn compliance_percent(actual: Amount, budget: Amount) -> f64 {
    if budget == 0 {
        0.0
    } else {
        actual as f64 / budget as f64 * 100.0
    }
}

pub fn variance_percent(actual: Amount, prior: Amount) -> Option<f64> {
    if prior == 0 {
        None
    } else {
        Some((actual - prior) as f64 / prior as f64 * 100.0)
    }
}
