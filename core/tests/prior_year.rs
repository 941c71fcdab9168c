//! Prior-year base tests.
//!
//! Loading last year's actuals must fill the comparison line without
//! counting as a report for the new year.

use chrono::NaiveDate;
use ledger_core::{
    clock::FixedClock, engine::LedgerEngine, event::LedgerEvent, store::UpsertRequest,
};

fn build(y: i32, m: u32, d: u32) -> LedgerEngine {
    let clock = FixedClock::on(NaiveDate::from_ymd_opt(y, m, d).unwrap());
    LedgerEngine::build_test(clock).expect("build test engine")
}

#[test]
fn copies_each_month_of_last_year() {
    let engine = build(2025, 5, 10);
    for (month, actual) in [(1, 100), (2, 200), (6, 600), (12, 1_200)] {
        engine
            .upsert_monthly_record(&UpsertRequest::new(2024, month, actual, 3_000_000))
            .unwrap();
    }

    let resp = engine.load_prior_year_base(2025).unwrap();
    assert_eq!(resp.source_year, 2024);
    assert_eq!(resp.values, [100, 200, 0, 0, 0, 600, 0, 0, 0, 0, 0, 1_200]);

    let row = engine.store.get_monthly(2025, 6).unwrap().unwrap();
    assert_eq!(row.prior_year_base_value, 600);
    assert!(!row.reported);
}

#[test]
fn loading_does_not_move_the_horizon() {
    let engine = build(2025, 5, 10);
    engine
        .upsert_monthly_record(&UpsertRequest::new(2024, 3, 50, 0))
        .unwrap();
    engine.load_prior_year_base(2025).unwrap();

    let series = engine.get_accumulated_series(2025).unwrap();
    assert_eq!(series.horizon.horizon_month, 0);
    assert_eq!(series.months[2].cumulative_prior_year, 50);
    // Placeholders keep the projected budget.
    assert_eq!(series.months[11].cumulative_budget, 36_000_000);
}

#[test]
fn prior_year_base_survives_later_upserts() {
    let engine = build(2025, 5, 10);
    engine
        .upsert_monthly_record(&UpsertRequest::new(2024, 1, 1_000, 0))
        .unwrap();
    engine.load_prior_year_base(2025).unwrap();

    let resp = engine
        .upsert_monthly_record(&UpsertRequest::new(2025, 1, 1_500, 3_000_000))
        .unwrap();
    assert!(resp.created, "first explicit upsert of the month");
    assert_eq!(resp.record.prior_year_base_value, 1_000);

    let series = engine.get_accumulated_series(2025).unwrap();
    assert_eq!(series.horizon.horizon_month, 1);
    assert_eq!(series.kpis.total_prior_year_to_date, 1_000);
    assert_eq!(series.kpis.year_over_year_variance_percent, Some(50.0));
}

#[test]
fn reload_overwrites_previous_base() {
    let engine = build(2025, 5, 10);
    engine
        .upsert_monthly_record(&UpsertRequest::new(2024, 2, 10, 0))
        .unwrap();
    engine.load_prior_year_base(2025).unwrap();

    engine
        .upsert_monthly_record(&UpsertRequest::new(2024, 2, 40, 0))
        .unwrap();
    engine.load_prior_year_base(2025).unwrap();

    let row = engine.store.get_monthly(2025, 2).unwrap().unwrap();
    assert_eq!(row.prior_year_base_value, 40);
}

/// Next year's comparison line only sees what this year's dashboard shows.
#[test]
fn source_year_in_progress_copies_only_reported_months() {
    let engine = build(2025, 9, 15);
    engine
        .upsert_monthly_record(&UpsertRequest::new(2025, 8, 800, 0))
        .unwrap();
    engine
        .upsert_monthly_record(&UpsertRequest::new(2025, 11, 1_100, 0))
        .unwrap();

    let resp = engine.load_prior_year_base(2026).unwrap();
    assert_eq!(resp.values[7], 800);
    assert_eq!(resp.values[10], 0);
}

#[test]
fn load_is_audited() {
    let engine = build(2025, 5, 10);
    engine.load_prior_year_base_as(2025, Some("controller")).unwrap();

    let events = engine.store.events_of_type("prior_year_base_loaded").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].actor.as_deref(), Some("controller"));
    match events[0].decode().unwrap() {
        LedgerEvent::PriorYearBaseLoaded { year, source_year, values } => {
            assert_eq!((year, source_year), (2025, 2024));
            assert_eq!(values.len(), 12);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
