//! Shared primitive types used across the entire ledger.

/// A calendar year. Ledger rows are only accepted from `LedgerConfig::min_year` on.
pub type Year = i32;

/// A calendar month, 1-based (January = 1).
pub type Month = u32;

/// Whole currency units. Never floating point: cumulative sums must not drift.
pub type Amount = i64;

/// Acting user supplied by the identity layer, recorded on writes.
pub type Actor = String;

pub const MONTHS_PER_YEAR: Month = 12;

/// Largest value accepted for any one month. Twelve of them still fit in an `Amount`.
pub const MAX_MONTHLY_AMOUNT: Amount = Amount::MAX / MONTHS_PER_YEAR as Amount;

/// Iterate every month of a year in order.
pub fn months() -> impl Iterator<Item = Month> {
    1..=MONTHS_PER_YEAR
}
