//! Accumulated damages ledger: monthly actual-vs-budget tracking with a
//! monotonic cumulative series, a projected budget line and a prior-year
//! comparison line.

pub mod accumulation;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod horizon;
pub mod kpi;
pub mod migration_verifier;
pub mod series;
pub mod store;
pub mod types;
