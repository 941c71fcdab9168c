use crate::types::{Amount, Year, MAX_MONTHLY_AMOUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ledger tuning, loaded from `{data_dir}/ledger/ledger_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Budget assumed for a month that has no reported row.
    pub fixed_monthly_budget: Amount,
    /// Earliest year the ledger accepts.
    #[serde(default = "default_min_year")]
    pub min_year: Year,
}

fn default_min_year() -> Year {
    2000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fixed_monthly_budget: 3_000_000,
            min_year: default_min_year(),
        }
    }
}

impl LedgerConfig {
    /// Load from the data/ directory.
    /// In tests, use LedgerConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/ledger/ledger_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LedgerConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0..=MAX_MONTHLY_AMOUNT).contains(&self.fixed_monthly_budget) {
            anyhow::bail!(
                "fixed_monthly_budget must be within 0..={MAX_MONTHLY_AMOUNT}, got {}",
                self.fixed_monthly_budget
            );
        }
        Ok(())
    }

    /// Load if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/ledger/ledger_config.json");
        if Path::new(&path).exists() {
            Self::load(data_dir)
        } else {
            log::warn!("{path} not found, using default ledger config");
            Ok(Self::default())
        }
    }
}
