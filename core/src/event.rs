//! Audit events: every ledger write and verification run is logged.
//!
//! RULE: Events are appended, never updated or deleted.
//! Variants are added over time, never removed or reordered.

use crate::types::{Actor, Amount, Month, Year};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    MonthlyRecordCreated {
        year: Year,
        month: Month,
        actual_value: Amount,
        budget_value: Amount,
    },
    /// Full overwrite of a month. The previous values are kept here since
    /// the row itself only keeps the latest.
    MonthlyRecordCorrected {
        year: Year,
        month: Month,
        previous_actual: Amount,
        previous_budget: Amount,
        actual_value: Amount,
        budget_value: Amount,
    },
    PriorYearBaseLoaded {
        year: Year,
        source_year: Year,
        values: Vec<Amount>,
    },
    MigrationVerified {
        total_legacy_records: u64,
        unique_incident_count: u64,
        duplicate_count: u64,
        valid_record_count: u64,
        discrepant_months: usize,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MonthlyRecordCreated { .. }   => "monthly_record_created",
            Self::MonthlyRecordCorrected { .. } => "monthly_record_corrected",
            Self::PriorYearBaseLoaded { .. }    => "prior_year_base_loaded",
            Self::MigrationVerified { .. }      => "migration_verified",
        }
    }

    pub fn year(&self) -> Option<Year> {
        match self {
            Self::MonthlyRecordCreated { year, .. }
            | Self::MonthlyRecordCorrected { year, .. }
            | Self::PriorYearBaseLoaded { year, .. } => Some(*year),
            Self::MigrationVerified { .. } => None,
        }
    }

    pub fn month(&self) -> Option<Month> {
        match self {
            Self::MonthlyRecordCreated { month, .. }
            | Self::MonthlyRecordCorrected { month, .. } => Some(*month),
            _ => None,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEventEntry {
    pub id: Option<i64>,
    pub year: Option<Year>,
    pub month: Option<Month>,
    pub event_type: String,
    pub actor: Option<Actor>,
    pub payload: String, // JSON-serialized LedgerEvent
    pub created_at: String,
}

impl LedgerEventEntry {
    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
