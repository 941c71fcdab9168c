//! Series composer: the dashboard-ready year.
//!
//! Months after the horizon carry the actual line forward flat instead of
//! dropping it: displayed actual is 0 and the cumulative actual stays at
//! its horizon value. Budget and prior-year lines are never clamped.
//!
//! Consumers (charts, PDF export) render these values as-is and must not
//! recompute their own running sums.

use crate::{
    accumulation::AccumulatedYear,
    horizon::YearHorizon,
    types::{Amount, Month, MONTHS_PER_YEAR},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesRegion {
    /// At or before the horizon.
    Reported,
    /// Current year, after the horizon but not after today's month.
    Frozen,
    /// Not yet due (later this year, or any month of a future year).
    Projected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMonth {
    pub month: Month,
    pub actual_value: Amount,
    pub budget_value: Amount,
    pub prior_year_base_value: Amount,
    pub cumulative_actual: Amount,
    pub cumulative_budget: Amount,
    pub cumulative_prior_year: Amount,
    pub region: SeriesRegion,
}

pub type DashboardSeries = [DashboardMonth; MONTHS_PER_YEAR as usize];

/// Cumulative actual at the horizon; 0 when nothing is reported.
pub fn actual_at_horizon(accumulated: &AccumulatedYear, horizon_month: Month) -> Amount {
    match horizon_month.min(MONTHS_PER_YEAR) {
        0 => 0,
        h => accumulated[(h - 1) as usize].cumulative_actual,
    }
}

/// Cumulative actual to display for `month`. Total for every month/horizon pair.
pub fn clamp_cumulative_actual(
    accumulated: &AccumulatedYear,
    horizon_month: Month,
    month: Month,
) -> Amount {
    if month == 0 {
        return 0;
    }
    if month <= horizon_month {
        accumulated[(month.min(MONTHS_PER_YEAR) - 1) as usize].cumulative_actual
    } else {
        actual_at_horizon(accumulated, horizon_month)
    }
}

fn region(horizon: &YearHorizon, month: Month) -> SeriesRegion {
    if horizon.includes(month) {
        SeriesRegion::Reported
    } else if horizon.is_current_year && month <= horizon.current_calendar_month {
        SeriesRegion::Frozen
    } else {
        SeriesRegion::Projected
    }
}

pub fn compose(accumulated: &AccumulatedYear, horizon: &YearHorizon) -> DashboardSeries {
    (*accumulated).map(|acc| {
        let in_horizon = horizon.includes(acc.month);
        DashboardMonth {
            month: acc.month,
            actual_value: if in_horizon { acc.actual_value } else { 0 },
            budget_value: acc.budget_value,
            prior_year_base_value: acc.prior_year_base_value,
            cumulative_actual: clamp_cumulative_actual(accumulated, horizon.horizon_month, acc.month),
            cumulative_budget: acc.cumulative_budget,
            cumulative_prior_year: acc.cumulative_prior_year,
            region: region(horizon, acc.month),
        }
    })
}
