//! Error types for the bank simulation.

use seqlock_ledger::{AccountId, LedgerError};
use thiserror::Error;

/// Errors raised while bootstrapping or running the scheduler.
///
/// None of these abort the process. A failed withdrawal is not an error at
/// all; see [`TaskOutcome::InsufficientFunds`](crate::TaskOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    /// A configuration value cannot be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The directory was built without any accounts.
    #[error("population is empty")]
    EmptyPopulation,

    /// An account id is outside the population.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// Idle-account search gave up.
    #[error("no idle account found after {attempts} attempts")]
    NoIdleAccount {
        /// Samples drawn before giving up.
        attempts: u64,
    },

    /// The account already has a task in flight.
    #[error("account {0} is already in flight")]
    AlreadyInFlight(AccountId),

    /// The account has no task in flight.
    #[error("account {0} is not in flight")]
    NotInFlight(AccountId),

    /// Every in-flight slot is taken.
    #[error("in-flight marker set is full")]
    MarkerSetFull,

    /// The completion queue was closed before a task could publish.
    #[error("completion queue closed")]
    QueueClosed,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    /// One or more worker threads panicked.
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),

    /// Underlying ledger failure.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
