//! Ledger error types.

use crate::types::AccountId;
use thiserror::Error;

/// Errors returned by ledger operations.
///
/// An insufficient balance is not an error: `withdraw` reports it as `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No entry exists for the account.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// The lock could not be acquired within the configured attempt budget.
    #[error("spin limit exceeded after {attempts} attempts")]
    SpinLimitExceeded {
        /// Attempts made before giving up.
        attempts: u64,
    },

    /// The new balance does not fit in a [`Balance`](crate::Balance).
    #[error("balance overflow on account {0}")]
    BalanceOverflow(AccountId),
}
