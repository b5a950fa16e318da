use crate::ports::UpgradeAuthorisationStore;
use parking_lot::RwLock;
use shared_types::StateRef;
use std::collections::HashMap;
use tracing::info;

#[derive(Default)]
pub struct InMemoryUpgradeAuthorisations {
    authorised: RwLock<HashMap<StateRef, String>>,
}

impl InMemoryUpgradeAuthorisations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpgradeAuthorisationStore for InMemoryUpgradeAuthorisations {
    fn authorise(&self, state_ref: StateRef, contract: String) {
        info!(state_ref = %state_ref, contract = %contract, "Contract upgrade authorised");
        self.authorised.write().insert(state_ref, contract);
    }

    fn authorised_upgrade(&self, state_ref: &StateRef) -> Option<String> {
        self.authorised.read().get(state_ref).cloned()
    }

    fn deauthorise(&self, state_ref: &StateRef) -> Option<String> {
        let removed = self.authorised.write().remove(state_ref);
        if let Some(contract) = &removed {
            info!(state_ref = %state_ref, contract = %contract, "Contract upgrade authorisation withdrawn");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::SecureHash;

    #[test]
    fn test_authorisation_lifecycle() {
        let store = InMemoryUpgradeAuthorisations::new();
        let state_ref = StateRef::new(SecureHash::sha256(b"issue"), 0);
        assert_eq!(store.authorised_upgrade(&state_ref), None);

        store.authorise(state_ref, "test.V2".into());
        store.authorise(state_ref, "test.V3".into());
        assert_eq!(store.authorised_upgrade(&state_ref), Some("test.V3".into()));

        assert_eq!(store.deauthorise(&state_ref), Some("test.V3".into()));
        assert_eq!(store.deauthorise(&state_ref), None);
    }
}
