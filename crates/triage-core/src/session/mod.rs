//! Session domain module.
//!
//! # Module Structure
//!
//! - `phase`: Triage protocol phases (`Phase`)
//! - `model`: The bootstrapped conversation (`ChatSession`)
//! - `bootstrap`: Collaborator traits (`SessionBootstrap`, `CareTeamGateway`, `CredentialProvider`)

mod bootstrap;
mod model;
mod phase;

pub use bootstrap::{CareTeamGateway, CredentialProvider, SessionBootstrap};
pub use model::ChatSession;
pub use phase::Phase;
