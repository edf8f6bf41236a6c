//! On-disk representation of the symptom ledger.

use serde::{Deserialize, Serialize};
use triage_core::ledger::SymptomLedger;

pub const LEDGER_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomLedgerDto {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_version() -> u32 {
    LEDGER_FILE_VERSION
}

impl From<&SymptomLedger> for SymptomLedgerDto {
    fn from(ledger: &SymptomLedger) -> Self {
        Self {
            version: LEDGER_FILE_VERSION,
            names: ledger.names().to_vec(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl From<SymptomLedgerDto> for SymptomLedger {
    fn from(dto: SymptomLedgerDto) -> Self {
        // Re-run normalization in case the file was edited by hand.
        SymptomLedger::from_names(dto.names)
    }
}
