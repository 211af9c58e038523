//! The account ledger.
//!
//! [`SequencedLedger`] keeps every balance in one [`ResizableChainTable`]
//! behind one [`ParityLock`]. Each operation takes the lock, reads the
//! balance, writes the new balance and releases the lock, so all ledger
//! mutations are totally ordered.

use crate::chain_table::{ResizableChainTable, DEFAULT_CAPACITY};
use crate::error::LedgerError;
use crate::seqlock::{LockStats, ParityLock};
use crate::types::{AccountId, Balance, SpinLimit};

/// Operations the bank needs from a ledger.
///
/// Implementations must be safe to call from many threads at once.
pub trait Ledger: Send + Sync {
    /// Withdraws `amount` if the balance is strictly greater than it.
    ///
    /// Returns `Ok(false)` and leaves the balance alone otherwise.
    fn withdraw(&self, id: AccountId, amount: Balance) -> Result<bool, LedgerError>;

    /// Adds `amount` to the balance.
    fn deposit(&self, id: AccountId, amount: Balance) -> Result<(), LedgerError>;

    /// Reads the current balance.
    fn balance(&self, id: AccountId) -> Result<Balance, LedgerError>;

    /// Returns a human-readable name for this ledger.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Configuration for a [`SequencedLedger`].
#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    /// Initial bucket count of the underlying table.
    pub initial_capacity: usize,
    /// Lock acquisition budget per operation.
    pub spin_limit: SpinLimit,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            spin_limit: SpinLimit::Unbounded,
        }
    }
}

/// Ledger serialized by a single global parity spin-lock.
///
/// # Example
///
/// ```
/// use seqlock_ledger::{Ledger, SequencedLedger};
///
/// let ledger = SequencedLedger::new();
/// ledger.open_account(7, 10_000).unwrap();
///
/// assert!(ledger.withdraw(7, 3_000).unwrap());
/// assert!(!ledger.withdraw(7, 7_000).unwrap()); // 7000 is not > 7000
/// ledger.deposit(7, 500).unwrap();
///
/// assert_eq!(ledger.balance(7).unwrap(), 7_500);
/// ```
#[derive(Debug)]
pub struct SequencedLedger {
    table: ParityLock<ResizableChainTable<AccountId, Balance>>,
    spin_limit: SpinLimit,
}

impl SequencedLedger {
    /// Creates an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Creates an empty ledger.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            table: ParityLock::new(ResizableChainTable::with_capacity(config.initial_capacity)),
            spin_limit: config.spin_limit,
        }
    }

    /// Creates the entry for `id`, or resets it if it already exists.
    pub fn open_account(&self, id: AccountId, balance: Balance) -> Result<(), LedgerError> {
        let mut table = self.table.lock(self.spin_limit)?;
        table.put(id, balance);
        Ok(())
    }

    /// Number of accounts in the ledger.
    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.table.lock(self.spin_limit)?.len())
    }

    /// Returns true if no account has been opened.
    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// Sum of every balance, read under a single acquisition.
    pub fn total_balance(&self) -> Result<Balance, LedgerError> {
        let table = self.table.lock(self.spin_limit)?;
        Ok(table.iter().map(|(_, balance)| *balance).sum())
    }

    /// Current value of the lock's parity word. Even when nobody holds it.
    pub fn lock_word(&self) -> u64 {
        self.table.word()
    }

    /// Lock contention counters.
    pub fn lock_stats(&self) -> LockStats {
        self.table.stats()
    }
}

impl Default for SequencedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for SequencedLedger {
    fn withdraw(&self, id: AccountId, amount: Balance) -> Result<bool, LedgerError> {
        let mut table = self.table.lock(self.spin_limit)?;
        let balance = *table.get(&id).ok_or(LedgerError::UnknownAccount(id))?;
        if balance > amount {
            let balance = balance
                .checked_sub(amount)
                .ok_or(LedgerError::BalanceOverflow(id))?;
            table.put(id, balance);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn deposit(&self, id: AccountId, amount: Balance) -> Result<(), LedgerError> {
        let mut table = self.table.lock(self.spin_limit)?;
        let balance = *table.get(&id).ok_or(LedgerError::UnknownAccount(id))?;
        let balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(id))?;
        table.put(id, balance);
        Ok(())
    }

    fn balance(&self, id: AccountId) -> Result<Balance, LedgerError> {
        let table = self.table.lock(self.spin_limit)?;
        table.get(&id).copied().ok_or(LedgerError::UnknownAccount(id))
    }

    fn name(&self) -> &'static str {
        "sequenced"
    }
}
