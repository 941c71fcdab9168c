//! The ledger engine. Owns the store, the clock and the config, and
//! exposes the four external operations.
//!
//! READ PATH (every call, nothing cached):
//!   1. Load the year's rows            (store, equality filter on year)
//!   2. Recompute running totals        (accumulation)
//!   3. Resolve the reporting horizon   (horizon, engine clock)
//!   4. Clamp and merge                 (series)
//!   5. Summarize                       (kpi)
//!
//! RULES:
//!   - "today" comes from the engine clock only, never from a caller.
//!   - Every successful write appends an audit event in the write's own
//!     transaction; a write whose event cannot be stored is rolled back.
//!   - Reads never write.

use crate::{
    accumulation,
    clock::{CalendarToday, FixedClock, LedgerClock, SystemClock},
    config::LedgerConfig,
    error::LedgerResult,
    event::{LedgerEvent, LedgerEventEntry},
    horizon::{self, YearHorizon},
    kpi::{self, YearSummary},
    migration_verifier::{self, LegacyDamageSource, MigrationDiscrepancyReport},
    series::{self, DashboardSeries},
    store::{validate_year, LedgerStore, MonthlyDamageRecord, UpsertRequest, SCHEMA_MIN_YEAR},
    types::{Amount, Year, MONTHS_PER_YEAR},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    pub created: bool,
    pub record: MonthlyDamageRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedSeriesResponse {
    pub year: Year,
    pub months: DashboardSeries,
    pub horizon: YearHorizon,
    pub kpis: YearSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriorYearBaseResponse {
    pub year: Year,
    pub source_year: Year,
    pub values: [Amount; MONTHS_PER_YEAR as usize],
}

pub struct LedgerEngine {
    pub config: LedgerConfig,
    pub store: LedgerStore,
    clock: Box<dyn LedgerClock>,
}

impl LedgerEngine {
    pub fn new(store: LedgerStore, clock: Box<dyn LedgerClock>, config: LedgerConfig) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Production wiring: wall clock.
    pub fn build(store: LedgerStore, config: LedgerConfig) -> Self {
        Self::new(store, Box::new(SystemClock), config)
    }

    /// In-memory, migrated store with default config and the given clock.
    pub fn build_test(clock: FixedClock) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, Box::new(clock), LedgerConfig::default()))
    }

    pub fn today(&self) -> CalendarToday {
        CalendarToday::from(self.clock.today())
    }

    fn min_year(&self) -> Year {
        self.config.min_year.max(SCHEMA_MIN_YEAR)
    }

    // ── upsert-monthly-record ──────────────────────────────────

    pub fn upsert_monthly_record(&self, req: &UpsertRequest) -> LedgerResult<UpsertResponse> {
        self.upsert_monthly_record_as(req, None)
    }

    /// Upsert on behalf of `actor`, as identified by the caller's auth layer.
    pub fn upsert_monthly_record_as(
        &self,
        req: &UpsertRequest,
        actor: Option<&str>,
    ) -> LedgerResult<UpsertResponse> {
        req.validate(self.min_year())?;

        let outcome = self
            .store
            .upsert_monthly_audited(req, self.clock.now(), actor, |outcome| {
                if !outcome.changed {
                    return Ok(None);
                }
                let event = match &outcome.previous {
                    Some(previous) => LedgerEvent::MonthlyRecordCorrected {
                        year: req.year,
                        month: req.month,
                        previous_actual: previous.actual_value,
                        previous_budget: previous.budget_value,
                        actual_value: req.actual_value,
                        budget_value: req.budget_value,
                    },
                    None => LedgerEvent::MonthlyRecordCreated {
                        year: req.year,
                        month: req.month,
                        actual_value: req.actual_value,
                        budget_value: req.budget_value,
                    },
                };
                self.event_entry(&event, actor).map(Some)
            })?;

        match (&outcome.previous, outcome.changed) {
            (_, false) => log::debug!(
                "upsert {}-{:02}: unchanged (actual={}, budget={})",
                req.year,
                req.month,
                req.actual_value,
                req.budget_value
            ),
            (Some(previous), true) => log::info!(
                "upsert {}-{:02}: corrected actual {} -> {}, budget {} -> {}",
                req.year,
                req.month,
                previous.actual_value,
                req.actual_value,
                previous.budget_value,
                req.budget_value
            ),
            (None, true) => log::info!(
                "upsert {}-{:02}: created (actual={}, budget={})",
                req.year,
                req.month,
                req.actual_value,
                req.budget_value
            ),
        }

        Ok(UpsertResponse {
            created: outcome.created,
            record: outcome.record,
        })
    }

    // ── get-accumulated-series ─────────────────────────────────

    pub fn get_accumulated_series(&self, year: Year) -> LedgerResult<AccumulatedSeriesResponse> {
        validate_year(year, self.min_year())?;

        let (horizon, months) = self.compose_year(year)?;
        let kpis = kpi::summarize(&months, &horizon);

        log::debug!(
            "series {year}: horizon={} current_year={} actual_to_date={}",
            horizon.horizon_month,
            horizon.is_current_year,
            kpis.total_actual_to_date
        );

        Ok(AccumulatedSeriesResponse {
            year,
            months,
            horizon,
            kpis,
        })
    }

    fn compose_year(&self, year: Year) -> LedgerResult<(YearHorizon, DashboardSeries)> {
        let rows = self.store.get_by_year(year)?;
        let accumulated = accumulation::recompute(year, &rows, self.config.fixed_monthly_budget);
        let horizon = horizon::resolve(year, self.today(), &rows);
        let months = series::compose(&accumulated, &horizon);
        Ok((horizon, months))
    }

    // ── load-prior-year-base ───────────────────────────────────

    /// Copy last year's displayed monthly actuals into `year`'s prior-year
    /// base. Months beyond last year's horizon copy as 0.
    pub fn load_prior_year_base(&self, year: Year) -> LedgerResult<PriorYearBaseResponse> {
        self.load_prior_year_base_as(year, None)
    }

    pub fn load_prior_year_base_as(
        &self,
        year: Year,
        actor: Option<&str>,
    ) -> LedgerResult<PriorYearBaseResponse> {
        validate_year(year, self.min_year())?;
        let source_year = year - 1;

        let (_, source) = self.compose_year(source_year)?;
        let values = source.map(|m| m.actual_value);

        let entry = self.event_entry(
            &LedgerEvent::PriorYearBaseLoaded {
                year,
                source_year,
                values: values.to_vec(),
            },
            actor,
        )?;
        self.store
            .load_prior_year_bases(year, &values, self.clock.now(), Some(&entry))?;

        log::info!(
            "prior-year base {year}: loaded from {source_year}, total {}",
            values.iter().fold(0, |acc: Amount, v| acc.saturating_add(*v))
        );

        Ok(PriorYearBaseResponse {
            year,
            source_year,
            values,
        })
    }

    // ── verify-migration ───────────────────────────────────────

    /// Reconcile the store's own legacy_damage table against the ledger.
    pub fn verify_migration(&self) -> LedgerResult<MigrationDiscrepancyReport> {
        self.verify_migration_against(&self.store)
    }

    pub fn verify_migration_against<S: LegacyDamageSource + ?Sized>(
        &self,
        source: &S,
    ) -> LedgerResult<MigrationDiscrepancyReport> {
        let report = migration_verifier::verify(source, &self.store)?;
        self.record_event(
            &LedgerEvent::MigrationVerified {
                total_legacy_records: report.total_legacy_records,
                unique_incident_count: report.unique_incident_count,
                duplicate_count: report.duplicate_count,
                valid_record_count: report.valid_record_count,
                discrepant_months: report.month_discrepancies.len(),
            },
            None,
        )?;
        Ok(report)
    }

    // ── Audit ──────────────────────────────────────────────────

    fn record_event(&self, event: &LedgerEvent, actor: Option<&str>) -> LedgerResult<()> {
        let entry = self.event_entry(event, actor)?;
        self.store.append_event(&entry)?;
        Ok(())
    }

    fn event_entry(&self, event: &LedgerEvent, actor: Option<&str>) -> LedgerResult<LedgerEventEntry> {
        Ok(LedgerEventEntry {
            id: None,
            year: event.year(),
            month: event.month(),
            event_type: event.type_name().to_string(),
            actor: actor.map(str::to_string),
            payload: serde_json::to_string(event)?,
            created_at: self.clock.now().to_rfc3339(),
        })
    }
}
