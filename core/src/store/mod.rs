//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Every other module works on the rows it returns and never executes SQL.
//! Cumulative totals are never persisted here.

use crate::{
    error::LedgerResult,
    event::LedgerEventEntry,
    types::Year,
};
use rusqlite::{params, Connection};

mod legacy;
mod monthly;

pub use legacy::NewLegacyDamage;
pub use monthly::{MonthlyDamageRecord, UpsertOutcome, UpsertRequest, SCHEMA_MIN_YEAR};
pub(crate) use monthly::validate_year;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // Concurrent upserts to the same month wait for the writer instead of failing.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_monthly_damage.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_legacy_damage.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &LedgerEventEntry) -> LedgerResult<i64> {
        Self::insert_event(&self.conn, entry)
    }

    /// Insert on any connection, so writers can audit inside their own transaction.
    fn insert_event(conn: &Connection, entry: &LedgerEventEntry) -> LedgerResult<i64> {
        conn.execute(
            "INSERT INTO ledger_event (year, month, event_type, actor, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.year,
                entry.month,
                entry.event_type,
                entry.actor,
                entry.payload,
                entry.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Events touching `year`, oldest first.
    pub fn events_for_year(&self, year: Year) -> LedgerResult<Vec<LedgerEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, year, month, event_type, actor, payload, created_at
             FROM ledger_event WHERE year = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![year], Self::map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_of_type(&self, event_type: &str) -> LedgerResult<Vec<LedgerEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, year, month, event_type, actor, payload, created_at
             FROM ledger_event WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![event_type], Self::map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> LedgerResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_event", [], |r| r.get(0))?)
    }

    fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEventEntry> {
        Ok(LedgerEventEntry {
            id: Some(row.get(0)?),
            year: row.get(1)?,
            month: row.get(2)?,
            event_type: row.get(3)?,
            actor: row.get(4)?,
            payload: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
