//! Concurrent bank simulation.
//!
//! Many client threads withdraw, deposit or receive pay against a shared
//! ledger, with at most one operation in flight per account at any time.
//!
//! # Architecture
//!
//! The crate is organized around three main concepts:
//!
//! - **Population**: the accounts and their opening balances
//! - **Scheduler**: a generator that dispatches one [`AccountTask`] per idle
//!   account and a reconciler that folds finished tasks back into the
//!   [`AccountDirectory`]
//! - **Ledger**: the authoritative balances, from the `seqlock-ledger` crate
//!
//! # Quick Start
//!
//! ```
//! use bank_sim::{Population, PopulationConfig, SchedulerConfig, TaskScheduler};
//! use seqlock_ledger::LedgerConfig;
//! use std::time::Duration;
//!
//! let population = Population::generate(PopulationConfig {
//!     num_accounts: 50,
//!     ..Default::default()
//! })?;
//! let ledger = population.open_ledger(LedgerConfig::default())?;
//!
//! let scheduler = TaskScheduler::new(
//!     population.directory()?,
//!     ledger,
//!     SchedulerConfig {
//!         task_attempts: 200,
//!         poll_interval: Duration::from_millis(20),
//!         ..Default::default()
//!     },
//! )?;
//! let report = scheduler.run()?;
//!
//! assert_eq!(report.reconciled, 200);
//! # Ok::<(), bank_sim::BankError>(())
//! ```

pub mod directory;
pub mod error;
pub mod scheduler;
pub mod task;

pub use directory::AccountDirectory;
pub use error::BankError;
pub use scheduler::{RunReport, SchedulerConfig, TaskScheduler};
pub use task::{AccountTask, AmountRanges, Completion, TaskKind, TaskOutcome};

use rand::{rngs::StdRng, Rng, SeedableRng};
use seqlock_ledger::{AccountId, Balance, Dollars, LedgerConfig, SequencedLedger};
use std::fmt;
use std::ops::Range;

// ============================================================================
// Account
// ============================================================================

/// A client's view of their account.
///
/// `cached_balance` is money the client holds locally. It is not the ledger
/// entry for the same id, and the two move independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// Identifier in `[0, population)`.
    pub id: AccountId,
    /// Locally held money, in cents.
    pub cached_balance: Balance,
}

impl Account {
    /// Creates an account snapshot.
    pub fn new(id: AccountId, cached_balance: Balance) -> Self {
        Self { id, cached_balance }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User #{} has {}", self.id, Dollars(self.cached_balance))
    }
}

// ============================================================================
// Population Configuration & Generation
// ============================================================================

/// Configuration for population bootstrap.
#[derive(Debug, Clone)]
pub struct PopulationConfig {
    /// Number of accounts.
    pub num_accounts: usize,
    /// Range the opening cached balance is drawn from, in cents.
    pub cached_balance: Range<Balance>,
    /// Range the opening ledger balance is drawn from, in cents.
    pub ledger_balance: Range<Balance>,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            num_accounts: 500,
            // $0.00 - $999.99
            cached_balance: 0..100_000,
            // $0.01 - $19,999.99
            ledger_balance: 1..2_000_000,
            seed: 42,
        }
    }
}

/// The accounts of a run and the ledger balances they open with.
#[derive(Debug, Clone)]
pub struct Population {
    /// Account snapshots, indexed by id.
    pub accounts: Vec<Account>,
    /// Opening ledger balance for each account, indexed by id.
    pub ledger_balances: Vec<Balance>,
    /// The configuration used to generate this population.
    pub config: PopulationConfig,
}

impl Population {
    /// Generates a population from the given configuration.
    pub fn generate(config: PopulationConfig) -> Result<Self, BankError> {
        if config.num_accounts == 0 {
            return Err(BankError::EmptyPopulation);
        }
        check_range("cached_balance", &config.cached_balance, 0)?;
        check_range("ledger_balance", &config.ledger_balance, 0)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let accounts: Vec<Account> = (0..config.num_accounts)
            .map(|id| Account::new(id, rng.gen_range(config.cached_balance.clone())))
            .collect();
        let ledger_balances: Vec<Balance> = (0..config.num_accounts)
            .map(|_| rng.gen_range(config.ledger_balance.clone()))
            .collect();

        Ok(Self {
            accounts,
            ledger_balances,
            config,
        })
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Creates a ledger with one entry per account.
    pub fn open_ledger(&self, config: LedgerConfig) -> Result<SequencedLedger, BankError> {
        let ledger = SequencedLedger::with_config(config);
        for (id, balance) in self.ledger_balances.iter().enumerate() {
            ledger.open_account(id, *balance)?;
        }
        Ok(ledger)
    }

    /// Creates a directory holding the opening snapshots.
    pub fn directory(&self) -> Result<AccountDirectory, BankError> {
        AccountDirectory::new(self.accounts.clone())
    }
}

/// Rejects empty ranges and ranges that reach below `min`.
pub(crate) fn check_range(
    name: &str,
    range: &Range<Balance>,
    min: Balance,
) -> Result<(), BankError> {
    if range.is_empty() {
        return Err(BankError::InvalidConfig(format!(
            "{name} range {}..{} is empty",
            range.start, range.end
        )));
    }
    if range.start < min {
        return Err(BankError::InvalidConfig(format!(
            "{name} range {}..{} starts below {min}",
            range.start, range.end
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
