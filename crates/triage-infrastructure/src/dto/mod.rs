//! Data transfer objects for files and REST bodies.

mod ledger;
mod session;

pub use ledger::{LEDGER_FILE_VERSION, SymptomLedgerDto};
pub use session::SessionBootstrapDto;
