//! Horizon resolver: which months of a year count as reported.
//!
//! Past years are closed: horizon 12. Future years are empty: horizon 0,
//! whatever rows exist. The current year reports up to the latest month,
//! no later than today's month, that has an explicit upsert. A month
//! upserted with value 0 is reported.

use crate::{
    clock::CalendarToday,
    store::MonthlyDamageRecord,
    types::{Month, Year, MONTHS_PER_YEAR},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct YearHorizon {
    pub year: Year,
    pub current_calendar_month: Month,
    pub horizon_month: Month,
    pub is_current_year: bool,
}

impl YearHorizon {
    pub fn is_future(&self, today: CalendarToday) -> bool {
        self.year > today.year
    }

    pub fn includes(&self, month: Month) -> bool {
        month <= self.horizon_month
    }
}

/// `rows` must be the rows of exactly `year` (see `LedgerStore::get_by_year`);
/// rows of any other year are ignored here as well.
pub fn resolve(year: Year, today: CalendarToday, rows: &[MonthlyDamageRecord]) -> YearHorizon {
    let horizon_month = if year < today.year {
        MONTHS_PER_YEAR
    } else if year > today.year {
        0
    } else {
        latest_reported_month(year, today.month, rows)
    };

    YearHorizon {
        year,
        current_calendar_month: today.month,
        horizon_month,
        is_current_year: year == today.year,
    }
}

fn latest_reported_month(year: Year, up_to: Month, rows: &[MonthlyDamageRecord]) -> Month {
    rows.iter()
        .filter(|r| r.year == year && r.reported && r.month <= up_to)
        .map(|r| r.month)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn reported(year: Year, month: Month) -> MonthlyDamageRecord {
        MonthlyDamageRecord {
            year,
            month,
            actual_value: 0,
            budget_value: 0,
            prior_year_base_value: 0,
            reported: true,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            updated_by: None,
        }
    }

    const TODAY: CalendarToday = CalendarToday { year: 2025, month: 9 };

    #[test]
    fn past_year_is_closed_even_when_sparse() {
        let h = resolve(2024, TODAY, &[reported(2024, 2)]);
        assert_eq!(h.horizon_month, 12);
        assert!(!h.is_current_year);
    }

    #[test]
    fn future_year_is_empty_even_with_rows() {
        let rows = [reported(2026, 1), reported(2026, 2)];
        let h = resolve(2026, TODAY, &rows);
        assert_eq!(h.horizon_month, 0);
        assert!(h.is_future(TODAY));
    }

    #[test]
    fn current_year_stops_at_latest_upsert_not_after_today() {
        let rows = [reported(2025, 3), reported(2025, 8), reported(2025, 11)];
        let h = resolve(2025, TODAY, &rows);
        assert_eq!(h.horizon_month, 8);
        assert_eq!(h.current_calendar_month, 9);
        assert!(h.is_current_year);
    }

    #[test]
    fn current_year_ignores_other_years_and_placeholders() {
        let mut placeholder = reported(2025, 7);
        placeholder.reported = false;
        let rows = [reported(2024, 9), placeholder];
        assert_eq!(resolve(2025, TODAY, &rows).horizon_month, 0);
    }

    #[test]
    fn horizon_never_regresses_as_months_are_added() {
        let mut rows = Vec::new();
        let mut last = 0;
        for month in [2, 1, 5, 3, 9, 4] {
            rows.push(reported(2025, month));
            let h = resolve(2025, TODAY, &rows).horizon_month;
            assert!(h >= last, "horizon went from {last} to {h}");
            last = h;
        }
        assert_eq!(last, 9);
    }
}
