//! Legacy per-incident damage table: read by the migration verifier.

use super::LedgerStore;
use crate::{error::LedgerResult, migration_verifier::LegacyDamageRow, types::Amount};
use chrono::NaiveDate;
use rusqlite::params;

/// A legacy row as handed to the store, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLegacyDamage {
    pub incident_date: Option<NaiveDate>,
    pub sector: String,
    pub machine: Option<String>,
    pub damage_type: String,
    pub amount: Option<Amount>,
}

impl LedgerStore {
    pub fn insert_legacy_damage(&self, row: &NewLegacyDamage) -> LedgerResult<i64> {
        self.conn.execute(
            "INSERT INTO legacy_damage (incident_date, sector, machine, damage_type, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.incident_date.map(|d| d.format("%Y-%m-%d").to_string()),
                row.sector,
                row.machine,
                row.damage_type,
                row.amount,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_legacy_damage(&self) -> LedgerResult<Vec<LegacyDamageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT legacy_id, incident_date, sector, machine, damage_type, amount
             FROM legacy_damage
             ORDER BY legacy_id ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let legacy_id: i64 = r.get(0)?;
                let raw_date: Option<String> = r.get(1)?;
                Ok(LegacyDamageRow {
                    legacy_id,
                    incident_date: raw_date.as_deref().and_then(|d| parse_legacy_date(legacy_id, d)),
                    sector: r.get(2)?,
                    machine: r.get(3)?,
                    damage_type: r.get(4)?,
                    amount: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn legacy_damage_count(&self) -> LedgerResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM legacy_damage", [], |r| r.get(0))?)
    }
}

/// Legacy dates were free text. Unparseable ones read as missing, which
/// makes the row invalid for the verifier rather than failing the read.
fn parse_legacy_date(legacy_id: i64, raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // Some exports carried a time component after the date.
    let date_part = match (raw.get(..10), raw.as_bytes().get(10)) {
        (Some(date), Some(b' ' | b'T')) => date,
        _ => raw,
    };
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("legacy_damage {legacy_id}: unparseable incident_date {raw:?}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_dates_tolerate_time_suffix() {
        assert_eq!(
            parse_legacy_date(1, "2024-03-07 14:22:00"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
        assert_eq!(
            parse_legacy_date(4, "2024-03-07T14:22:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
        assert_eq!(parse_legacy_date(2, "07/03/2024"), None);
        assert_eq!(parse_legacy_date(3, ""), None);
    }

    #[test]
    fn trailing_garbage_is_not_truncated_away() {
        assert_eq!(parse_legacy_date(1, "2024-03-071"), None);
        assert_eq!(parse_legacy_date(2, "2024-03-07x12:00"), None);
    }
}
