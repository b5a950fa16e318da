//! Ports layer
//!
//! Signing is the one place an application decides whether it agrees with
//! a transaction. It plugs in here.

use shared_types::SignedTransaction;

/// Domain checks a signer runs before adding its signature.
///
/// The error string is sent to the collector as
/// [`crate::FinalityError::TransactionRejected`].
pub trait TransactionChecker: Send + Sync {
    fn check_transaction(&self, stx: &SignedTransaction) -> Result<(), String>;
}

impl<F> TransactionChecker for F
where
    F: Fn(&SignedTransaction) -> Result<(), String> + Send + Sync,
{
    fn check_transaction(&self, stx: &SignedTransaction) -> Result<(), String> {
        self(stx)
    }
}
