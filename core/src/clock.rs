//! Ledger clock: the only source of "now" and "today".
//!
//! RULE: No operation accepts a caller-supplied date. The reporting horizon
//! is derived from the engine's clock so a client cannot unlock future
//! months by claiming a later "today".

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

pub trait LedgerClock: Send {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LedgerClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant. Clones share the same instant, so a
/// test can keep a handle and move time after handing the clock to an engine.
#[derive(Debug, Clone)]
pub struct FixedClock {
    unix_secs: Arc<AtomicI64>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            unix_secs: Arc::new(AtomicI64::new(at.timestamp())),
        }
    }

    /// Midnight UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.unix_secs.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(NaiveTime::MIN).and_utc());
    }

    /// Move forward by whole seconds. Used to make `updated_at` bumps observable.
    pub fn advance_secs(&self, secs: i64) {
        self.unix_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl LedgerClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.unix_secs.load(Ordering::SeqCst), 0)
            .unwrap_or_default()
    }
}

/// Calendar position used by the horizon resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarToday {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDate> for CalendarToday {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}
