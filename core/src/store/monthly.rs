//! Monthly damage record queries: the ledger proper.

use super::LedgerStore;
use crate::{
    error::{LedgerError, LedgerResult},
    event::LedgerEventEntry,
    types::{Amount, Month, Year, MAX_MONTHLY_AMOUNT, MONTHS_PER_YEAR},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// Floor enforced by the schema's CHECK constraint.
pub const SCHEMA_MIN_YEAR: Year = 2000;

/// One month of the ledger as stored.
///
/// `reported` is false for placeholder rows created only to carry a
/// prior-year base. Such rows count as missing for actual and budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyDamageRecord {
    pub year: Year,
    pub month: Month,
    pub actual_value: Amount,
    pub budget_value: Amount,
    pub prior_year_base_value: Amount,
    pub reported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

/// Full-value write of one month. Never a delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub year: Year,
    pub month: Month,
    pub actual_value: Amount,
    pub budget_value: Amount,
}

impl UpsertRequest {
    pub fn new(year: Year, month: Month, actual_value: Amount, budget_value: Amount) -> Self {
        Self {
            year,
            month,
            actual_value,
            budget_value,
        }
    }

    pub fn validate(&self, min_year: Year) -> LedgerResult<()> {
        validate_year(self.year, min_year)?;
        validate_month(self.month)?;
        validate_amount("actualValue", self.actual_value)?;
        validate_amount("budgetValue", self.budget_value)?;
        Ok(())
    }
}

pub(crate) fn validate_year(year: Year, min_year: Year) -> LedgerResult<()> {
    if year < min_year.max(SCHEMA_MIN_YEAR) {
        return Err(LedgerError::validation(
            "year",
            format!("{year} is before {}", min_year.max(SCHEMA_MIN_YEAR)),
        ));
    }
    Ok(())
}

pub(crate) fn validate_month(month: Month) -> LedgerResult<()> {
    if !(1..=MONTHS_PER_YEAR).contains(&month) {
        return Err(LedgerError::validation(
            "month",
            format!("{month} is outside 1..=12"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_amount(field: &'static str, value: Amount) -> LedgerResult<()> {
    if value < 0 {
        return Err(LedgerError::validation(field, format!("{value} is negative")));
    }
    if value > MAX_MONTHLY_AMOUNT {
        return Err(LedgerError::validation(
            field,
            format!("{value} exceeds the monthly maximum {MAX_MONTHLY_AMOUNT}"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub record: MonthlyDamageRecord,
    /// True when the month received its first explicit upsert.
    pub created: bool,
    /// False when the request matched the stored values and nothing was written.
    pub changed: bool,
    /// The row as it was before a correction overwrote it.
    pub previous: Option<MonthlyDamageRecord>,
}

const RECORD_COLUMNS: &str = "year, month, actual_value, budget_value, prior_year_base_value,
     reported, created_at, updated_at, updated_by";

impl LedgerStore {
    /// Create or fully overwrite one month's actual and budget.
    ///
    /// Runs in an IMMEDIATE transaction so concurrent writers to the same
    /// month serialize on the database lock; the last writer wins.
    pub fn upsert_monthly(
        &self,
        req: &UpsertRequest,
        now: DateTime<Utc>,
        actor: Option<&str>,
    ) -> LedgerResult<UpsertOutcome> {
        self.upsert_monthly_audited(req, now, actor, |_| Ok(None))
    }

    /// `upsert_monthly`, plus the audit entry `audit` builds from the
    /// outcome, committed in the same transaction. If `audit` or the event
    /// insert fails, the row write is rolled back too.
    pub fn upsert_monthly_audited<F>(
        &self,
        req: &UpsertRequest,
        now: DateTime<Utc>,
        actor: Option<&str>,
        audit: F,
    ) -> LedgerResult<UpsertOutcome>
    where
        F: FnOnce(&UpsertOutcome) -> LedgerResult<Option<LedgerEventEntry>>,
    {
        req.validate(SCHEMA_MIN_YEAR)?;

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let existing = Self::select_monthly(&tx, req.year, req.month)?;

        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO monthly_damage
                     (year, month, actual_value, budget_value, prior_year_base_value,
                      reported, created_at, updated_at, updated_by)
                     VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?5, ?6)",
                    params![
                        req.year,
                        req.month,
                        req.actual_value,
                        req.budget_value,
                        now,
                        actor,
                    ],
                )?;
                UpsertOutcome {
                    record: MonthlyDamageRecord {
                        year: req.year,
                        month: req.month,
                        actual_value: req.actual_value,
                        budget_value: req.budget_value,
                        prior_year_base_value: 0,
                        reported: true,
                        created_at: now,
                        updated_at: now,
                        updated_by: actor.map(str::to_string),
                    },
                    created: true,
                    changed: true,
                    previous: None,
                }
            }
            Some(row)
                if row.reported
                    && row.actual_value == req.actual_value
                    && row.budget_value == req.budget_value =>
            {
                UpsertOutcome {
                    record: row,
                    created: false,
                    changed: false,
                    previous: None,
                }
            }
            Some(row) => {
                tx.execute(
                    "UPDATE monthly_damage
                     SET actual_value = ?3, budget_value = ?4, reported = 1,
                         updated_at = ?5, updated_by = ?6
                     WHERE year = ?1 AND month = ?2",
                    params![
                        req.year,
                        req.month,
                        req.actual_value,
                        req.budget_value,
                        now,
                        actor,
                    ],
                )?;
                let first_report = !row.reported;
                let record = MonthlyDamageRecord {
                    actual_value: req.actual_value,
                    budget_value: req.budget_value,
                    reported: true,
                    updated_at: now,
                    updated_by: actor.map(str::to_string),
                    ..row.clone()
                };
                UpsertOutcome {
                    record,
                    created: first_report,
                    changed: true,
                    previous: (!first_report).then_some(row),
                }
            }
        };

        if let Some(entry) = audit(&outcome)? {
            Self::insert_event(&tx, &entry)?;
        }
        tx.commit()?;
        Ok(outcome)
    }

    /// Set the prior-year base for one month. Creates an un-reported
    /// placeholder row when the month has never been upserted, so the
    /// reporting horizon is not moved by this call.
    pub fn load_prior_year_base(
        &self,
        year: Year,
        month: Month,
        base_value: Amount,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        Self::write_prior_year_base(&self.conn, year, month, base_value, now)
    }

    /// Set all twelve prior-year bases of `year` in one transaction,
    /// together with `audit` when given.
    pub fn load_prior_year_bases(
        &self,
        year: Year,
        base_values: &[Amount; MONTHS_PER_YEAR as usize],
        now: DateTime<Utc>,
        audit: Option<&LedgerEventEntry>,
    ) -> LedgerResult<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        for (month, base_value) in (1..=MONTHS_PER_YEAR).zip(base_values) {
            Self::write_prior_year_base(&tx, year, month, *base_value, now)?;
        }
        if let Some(entry) = audit {
            Self::insert_event(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn write_prior_year_base(
        conn: &rusqlite::Connection,
        year: Year,
        month: Month,
        base_value: Amount,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        validate_year(year, SCHEMA_MIN_YEAR)?;
        validate_month(month)?;
        validate_amount("priorYearBaseValue", base_value)?;

        conn.execute(
            "INSERT INTO monthly_damage
             (year, month, actual_value, budget_value, prior_year_base_value,
              reported, created_at, updated_at)
             VALUES (?1, ?2, 0, 0, ?3, 0, ?4, ?4)
             ON CONFLICT (year, month) DO UPDATE
             SET prior_year_base_value = excluded.prior_year_base_value,
                 updated_at = excluded.updated_at",
            params![year, month, base_value, now],
        )?;
        Ok(())
    }

    pub fn get_monthly(&self, year: Year, month: Month) -> LedgerResult<Option<MonthlyDamageRecord>> {
        Self::select_monthly(&self.conn, year, month)
    }

    /// All stored rows for exactly `year`, month ascending. Gaps allowed.
    ///
    /// The filter is strict equality on year; a range filter here would let
    /// a later year pick up this year's rows.
    pub fn get_by_year(&self, year: Year) -> LedgerResult<Vec<MonthlyDamageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM monthly_damage
             WHERE year = ?1
             ORDER BY month ASC"
        ))?;
        let rows = stmt
            .query_map(params![year], Self::map_monthly_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn monthly_record_count(&self) -> LedgerResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM monthly_damage", [], |r| r.get(0))?)
    }

    fn select_monthly(
        conn: &rusqlite::Connection,
        year: Year,
        month: Month,
    ) -> LedgerResult<Option<MonthlyDamageRecord>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS}
                     FROM monthly_damage WHERE year = ?1 AND month = ?2"
                ),
                params![year, month],
                Self::map_monthly_row,
            )
            .optional()?)
    }

    fn map_monthly_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MonthlyDamageRecord> {
        Ok(MonthlyDamageRecord {
            year: row.get(0)?,
            month: row.get(1)?,
            actual_value: row.get(2)?,
            budget_value: row.get(3)?,
            prior_year_base_value: row.get(4)?,
            reported: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            updated_by: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> LedgerStore {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn insert_then_correct_keeps_prior_year_base() {
        let store = store();
        store.load_prior_year_base(2025, 3, 900, at(0)).unwrap();

        let first = store
            .upsert_monthly(&UpsertRequest::new(2025, 3, 100, 200), at(1), Some("ops"))
            .unwrap();
        assert!(first.created, "placeholder promotion counts as creation");
        assert_eq!(first.record.prior_year_base_value, 900);

        let second = store
            .upsert_monthly(&UpsertRequest::new(2025, 3, 150, 200), at(2), None)
            .unwrap();
        assert!(!second.created);
        assert!(second.changed);
        assert_eq!(second.previous.as_ref().map(|p| p.actual_value), Some(100));

        let stored = store.get_monthly(2025, 3).unwrap().unwrap();
        assert_eq!(stored.actual_value, 150);
        assert_eq!(stored.prior_year_base_value, 900);
        assert_eq!(stored.updated_at, at(2));
        assert_eq!(stored.created_at, at(0));
    }

    #[test]
    fn rejected_upsert_writes_nothing() {
        let store = store();
        let err = store
            .upsert_monthly(&UpsertRequest::new(2025, 13, 1, 1), at(0), None)
            .unwrap_err();
        assert!(err.is_validation());

        let err = store
            .upsert_monthly(&UpsertRequest::new(2025, 4, -5, 1), at(0), None)
            .unwrap_err();
        assert!(err.is_validation());

        assert_eq!(store.monthly_record_count().unwrap(), 0);
    }

    fn entry(event_type: &str) -> LedgerEventEntry {
        LedgerEventEntry {
            id: None,
            year: Some(2025),
            month: Some(3),
            event_type: event_type.to_string(),
            actor: Some("ops".into()),
            payload: "{}".into(),
            created_at: at(0).to_rfc3339(),
        }
    }

    #[test]
    fn audited_upsert_commits_row_and_event_together() {
        let store = store();
        let outcome = store
            .upsert_monthly_audited(&UpsertRequest::new(2025, 3, 100, 200), at(0), Some("ops"), |o| {
                assert!(o.created);
                Ok(Some(entry("monthly_record_created")))
            })
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(store.monthly_record_count().unwrap(), 1);
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn failed_audit_rolls_back_the_row() {
        let store = store();
        store.conn.execute_batch("DROP TABLE ledger_event").unwrap();

        let err = store.upsert_monthly_audited(&UpsertRequest::new(2025, 3, 100, 200), at(0), None, |_| {
            Ok(Some(entry("monthly_record_created")))
        });
        assert!(err.is_err());
        assert_eq!(store.monthly_record_count().unwrap(), 0);

        let err = store.load_prior_year_bases(2025, &[7; 12], at(0), Some(&entry("prior_year_base_loaded")));
        assert!(err.is_err());
        assert!(store.get_by_year(2025).unwrap().is_empty());
    }

    #[test]
    fn failed_audit_leaves_correction_retryable() {
        let store = store();
        store
            .upsert_monthly(&UpsertRequest::new(2025, 3, 100, 200), at(0), None)
            .unwrap();

        let req = UpsertRequest::new(2025, 3, 150, 200);
        let err = store.upsert_monthly_audited(&req, at(1), None, |_| {
            Err(LedgerError::validation("audit", "refused"))
        });
        assert!(err.is_err());
        assert_eq!(store.get_monthly(2025, 3).unwrap().unwrap().actual_value, 100);

        // The retry still sees a change to audit.
        let retry = store
            .upsert_monthly_audited(&req, at(2), None, |o| {
                assert_eq!(o.previous.as_ref().map(|p| p.actual_value), Some(100));
                Ok(Some(entry("monthly_record_corrected")))
            })
            .unwrap();
        assert!(retry.changed);
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn get_by_year_is_ordered_and_exact() {
        let store = store();
        for (year, month) in [(2025, 9), (2025, 2), (2026, 1), (2024, 12)] {
            store
                .upsert_monthly(&UpsertRequest::new(year, month, 10, 10), at(0), None)
                .unwrap();
        }

        let months: Vec<Month> = store.get_by_year(2025).unwrap().iter().map(|r| r.month).collect();
        assert_eq!(months, vec![2, 9]);
    }
}
