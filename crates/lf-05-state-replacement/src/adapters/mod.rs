//! Adapters layer

mod authorisations;
mod verifiers;

pub use authorisations::InMemoryUpgradeAuthorisations;
pub use verifiers::{ContractUpgradeVerifier, NotaryChangeVerifier};
