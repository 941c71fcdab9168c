//! Migration verifier: reconciles the legacy per-incident damage table
//! against the consolidated monthly ledger.
//!
//! Design:
//!   - Natural incident key = (incident_date, sector, machine, damage_type, amount)
//!   - duplicate_count = total rows − distinct natural keys
//!   - Valid row = incident date present AND amount present and non-zero
//!   - Month discrepancy = sum of distinct valid legacy amounts for a month
//!     vs the ledger's reported actual for that month
//!
//! Reports only. Fixing a discrepancy is a manual re-upsert of the month.

use crate::{
    error::{LedgerError, LedgerResult},
    store::{LedgerStore, MonthlyDamageRecord},
    types::{Amount, Month, Year},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyDamageRow {
    pub legacy_id: i64,
    pub incident_date: Option<NaiveDate>,
    pub sector: String,
    pub machine: Option<String>,
    pub damage_type: String,
    pub amount: Option<Amount>,
}

type NaturalKey<'a> = (Option<NaiveDate>, &'a str, Option<&'a str>, &'a str, Option<Amount>);

impl LegacyDamageRow {
    fn natural_key(&self) -> NaturalKey<'_> {
        (
            self.incident_date,
            self.sector.trim(),
            self.machine.as_deref().map(str::trim),
            self.damage_type.trim(),
            self.amount,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.incident_date.is_some() && matches!(self.amount, Some(a) if a != 0)
    }
}

/// Anything that can hand over the full legacy table.
pub trait LegacyDamageSource {
    fn legacy_rows(&self) -> LedgerResult<Vec<LegacyDamageRow>>;
}

impl LegacyDamageSource for LedgerStore {
    fn legacy_rows(&self) -> LedgerResult<Vec<LegacyDamageRow>> {
        self.list_legacy_damage()
    }
}

impl LegacyDamageSource for [LegacyDamageRow] {
    fn legacy_rows(&self) -> LedgerResult<Vec<LegacyDamageRow>> {
        Ok(self.to_vec())
    }
}

impl LegacyDamageSource for Vec<LegacyDamageRow> {
    fn legacy_rows(&self) -> LedgerResult<Vec<LegacyDamageRow>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthDiscrepancy {
    pub year: Year,
    pub month: Month,
    pub legacy_total: Amount,
    /// None when the ledger has no reported row for the month.
    pub ledger_actual: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDiscrepancyReport {
    pub total_legacy_records: u64,
    pub unique_incident_count: u64,
    pub duplicate_count: u64,
    pub valid_record_count: u64,
    #[serde(default)]
    pub month_discrepancies: Vec<MonthDiscrepancy>,
}

impl MigrationDiscrepancyReport {
    pub fn is_consistent(&self) -> bool {
        self.duplicate_count == 0 && self.month_discrepancies.is_empty()
    }

    /// Turn an inconsistent report into an error, for callers that want to fail hard.
    pub fn ensure_consistent(&self) -> LedgerResult<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(LedgerError::Consistency {
                duplicate_count: self.duplicate_count,
                discrepant_months: self.month_discrepancies.len(),
            })
        }
    }
}

/// Count, de-duplicate and filter the legacy rows, then compare monthly
/// totals against `ledger_rows`. Pure.
pub fn reconcile(legacy: &[LegacyDamageRow], ledger_rows: &[MonthlyDamageRecord]) -> MigrationDiscrepancyReport {
    let total = legacy.len() as u64;

    let mut seen: HashSet<NaturalKey<'_>> = HashSet::with_capacity(legacy.len());
    let mut legacy_totals: BTreeMap<(Year, Month), Amount> = BTreeMap::new();
    for row in legacy {
        if !seen.insert(row.natural_key()) {
            continue;
        }
        if let (true, Some(date), Some(amount)) = (row.is_valid(), row.incident_date, row.amount) {
            let total = legacy_totals.entry((date.year(), date.month())).or_insert(0);
            *total = total.saturating_add(amount);
        }
    }
    let unique = seen.len() as u64;
    let valid = legacy.iter().filter(|r| r.is_valid()).count() as u64;

    let month_discrepancies = legacy_totals
        .into_iter()
        .filter_map(|((year, month), legacy_total)| {
            let ledger_actual = ledger_rows
                .iter()
                .find(|r| r.year == year && r.month == month && r.reported)
                .map(|r| r.actual_value);
            (ledger_actual != Some(legacy_total)).then_some(MonthDiscrepancy {
                year,
                month,
                legacy_total,
                ledger_actual,
            })
        })
        .collect();

    MigrationDiscrepancyReport {
        total_legacy_records: total,
        unique_incident_count: unique,
        duplicate_count: total - unique,
        valid_record_count: valid,
        month_discrepancies,
    }
}

/// Read the legacy source and the ledger years it covers, then reconcile.
pub fn verify<S: LegacyDamageSource + ?Sized>(
    source: &S,
    store: &LedgerStore,
) -> LedgerResult<MigrationDiscrepancyReport> {
    let legacy = source.legacy_rows()?;

    let years: BTreeSet<Year> = legacy
        .iter()
        .filter_map(|r| r.incident_date.map(|d| d.year()))
        .collect();
    let mut ledger_rows = Vec::new();
    for year in years {
        ledger_rows.extend(store.get_by_year(year)?);
    }

    let report = reconcile(&legacy, &ledger_rows);
    if report.is_consistent() {
        log::info!(
            "migration verify: {} legacy rows, {} unique, ledger consistent",
            report.total_legacy_records,
            report.unique_incident_count
        );
    } else {
        log::warn!(
            "migration verify: {} legacy rows, {} unique, {} duplicates, {} discrepant months",
            report.total_legacy_records,
            report.unique_incident_count,
            report.duplicate_count,
            report.month_discrepancies.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(id: i64, date: Option<(i32, u32, u32)>, machine: &str, amount: Option<Amount>) -> LegacyDamageRow {
        LegacyDamageRow {
            legacy_id: id,
            incident_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            sector: "north".into(),
            machine: Some(machine.into()),
            damage_type: "scratch".into(),
            amount,
        }
    }

    #[test]
    fn duplicates_differ_only_by_legacy_id() {
        let rows = vec![
            legacy(1, Some((2024, 1, 5)), "M-1", Some(100)),
            legacy(2, Some((2024, 1, 5)), "M-1", Some(100)),
            legacy(3, Some((2024, 1, 5)), "M-2", Some(100)),
        ];
        let report = reconcile(&rows, &[]);
        assert_eq!(report.total_legacy_records, 3);
        assert_eq!(report.unique_incident_count, 2);
        assert_eq!(report.duplicate_count, 1);
    }

    #[test]
    fn validity_needs_date_and_non_zero_amount() {
        let rows = vec![
            legacy(1, None, "M-1", Some(100)),
            legacy(2, Some((2024, 1, 5)), "M-1", None),
            legacy(3, Some((2024, 1, 5)), "M-2", Some(0)),
            legacy(4, Some((2024, 1, 5)), "M-3", Some(10)),
        ];
        assert_eq!(reconcile(&rows, &[]).valid_record_count, 1);
    }

    #[test]
    fn whitespace_variants_share_a_natural_key() {
        let mut padded = legacy(2, Some((2024, 1, 5)), " M-1 ", Some(100));
        padded.sector = "north ".into();
        let rows = vec![legacy(1, Some((2024, 1, 5)), "M-1", Some(100)), padded];
        assert_eq!(reconcile(&rows, &[]).duplicate_count, 1);
    }

    #[test]
    fn extreme_legacy_amounts_saturate() {
        let rows = vec![
            legacy(1, Some((2024, 1, 5)), "M-1", Some(Amount::MAX)),
            legacy(2, Some((2024, 1, 6)), "M-1", Some(Amount::MAX)),
            legacy(3, Some((2024, 2, 5)), "M-1", Some(Amount::MIN)),
            legacy(4, Some((2024, 2, 6)), "M-1", Some(-1)),
        ];
        let report = reconcile(&rows, &[]);
        let totals: Vec<Amount> = report.month_discrepancies.iter().map(|d| d.legacy_total).collect();
        assert_eq!(totals, vec![Amount::MAX, Amount::MIN]);
    }

    #[test]
    fn consistent_report_passes() {
        let report = MigrationDiscrepancyReport {
            total_legacy_records: 2,
            unique_incident_count: 2,
            duplicate_count: 0,
            valid_record_count: 2,
            month_discrepancies: vec![],
        };
        assert!(report.ensure_consistent().is_ok());
    }
}
