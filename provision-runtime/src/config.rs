use anyhow::Context;
use provision_core::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ledger configuration, loaded from JSON
///
/// ```json
/// { "journal_path": "/var/lib/provision/ops.journal", "journal_failed_operations": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// File journal location; no journal is kept when unset
    pub journal_path: Option<PathBuf>,

    /// Also journal operations that aborted
    pub journal_failed_operations: bool,
}

impl LedgerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ProvisionError> {
        serde_json::from_str(text).map_err(|e| ProvisionError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ProvisionError> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading ledger config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn with_journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    pub fn with_failed_operations_journaled(mut self, enabled: bool) -> Self {
        self.journal_failed_operations = enabled;
        self
    }
}
