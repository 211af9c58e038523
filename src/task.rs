//! Units of work run by client threads.
//!
//! Each [`AccountTask`] owns a private copy of one account, performs a single
//! operation and hands the copy back through the completion queue.

use crate::{check_range, Account, BankError};
use crossbeam::channel::Sender;
use rand::{rngs::StdRng, Rng, SeedableRng};
use seqlock_ledger::{Balance, Ledger, LedgerError};
use std::ops::Range;
use tracing::{trace, warn};

/// The operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Withdraw from the ledger for a purchase; the amount is credited to the
    /// cached balance on success.
    Withdraw,
    /// Move part of the cached balance into the ledger.
    Deposit,
    /// Receive pay into the cached balance. No ledger access.
    ReceivePay,
}

impl TaskKind {
    /// Every kind, in a fixed order.
    pub const ALL: [TaskKind; 3] = [
        TaskKind::Withdraw,
        TaskKind::Deposit,
        TaskKind::ReceivePay,
    ];

    /// Picks a kind uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Bounds on the amounts tasks draw, in cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountRanges {
    /// Purchase withdrawals.
    pub withdraw: Range<Balance>,
    /// Pay received.
    pub pay: Range<Balance>,
}

impl Default for AmountRanges {
    fn default() -> Self {
        Self {
            // $0.01 - $9,999.99
            withdraw: 1..1_000_000,
            // $500.00 - $19,999.99
            pay: 50_000..2_000_000,
        }
    }
}

impl AmountRanges {
    /// Rejects empty ranges and amounts below one cent.
    pub fn validate(&self) -> Result<(), BankError> {
        check_range("withdraw", &self.withdraw, 1)?;
        check_range("pay", &self.pay, 1)
    }
}

/// What a task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The ledger accepted the withdrawal.
    Withdrew(Balance),
    /// The ledger balance did not exceed the amount.
    InsufficientFunds(Balance),
    /// The amount moved from the cached balance into the ledger.
    Deposited(Balance),
    /// The cached balance was too small to draw a deposit from.
    DepositSkipped,
    /// Pay credited to the cached balance.
    Paid(Balance),
    /// The ledger call failed; the snapshot is returned unchanged.
    LedgerFault(LedgerError),
}

/// A finished task, as received by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The task's copy of the account, possibly mutated.
    pub account: Account,
    /// The operation that ran.
    pub kind: TaskKind,
    /// Its result.
    pub outcome: TaskOutcome,
}

/// One operation bound to one account snapshot.
#[derive(Debug, Clone)]
pub struct AccountTask {
    account: Account,
    kind: TaskKind,
    seed: u64,
}

impl AccountTask {
    /// Creates a task. `seed` drives the amount drawn.
    pub fn new(account: Account, kind: TaskKind, seed: u64) -> Self {
        Self {
            account,
            kind,
            seed,
        }
    }

    /// The account this task operates on.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// The operation this task performs.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Performs the operation and returns the mutated snapshot.
    pub fn execute<L: Ledger + ?Sized>(self, ledger: &L, amounts: &AmountRanges) -> Completion {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut account = self.account;

        let outcome = match self.kind {
            TaskKind::Withdraw => {
                let amount = rng.gen_range(amounts.withdraw.clone());
                match ledger.withdraw(account.id, amount) {
                    Ok(true) => {
                        account.cached_balance += amount;
                        TaskOutcome::Withdrew(amount)
                    }
                    Ok(false) => TaskOutcome::InsufficientFunds(amount),
                    Err(err) => TaskOutcome::LedgerFault(err),
                }
            }
            TaskKind::Deposit => {
                if account.cached_balance < 2 {
                    TaskOutcome::DepositSkipped
                } else {
                    let amount = rng.gen_range(1..account.cached_balance);
                    match ledger.deposit(account.id, amount) {
                        Ok(()) => {
                            account.cached_balance -= amount;
                            TaskOutcome::Deposited(amount)
                        }
                        Err(err) => TaskOutcome::LedgerFault(err),
                    }
                }
            }
            TaskKind::ReceivePay => {
                let amount = rng.gen_range(amounts.pay.clone());
                account.cached_balance += amount;
                TaskOutcome::Paid(amount)
            }
        };

        if let TaskOutcome::LedgerFault(err) = &outcome {
            warn!(account = account.id, kind = ?self.kind, %err, "ledger operation failed");
        } else {
            trace!(account = account.id, kind = ?self.kind, ?outcome, "task finished");
        }

        Completion {
            account,
            kind: self.kind,
            outcome,
        }
    }

    /// Performs the operation and publishes the snapshot to `done`.
    pub fn run<L: Ledger + ?Sized>(
        self,
        ledger: &L,
        amounts: &AmountRanges,
        done: &Sender<Completion>,
    ) -> Result<(), BankError> {
        let completion = self.execute(ledger, amounts);
        done.send(completion).map_err(|_| BankError::QueueClosed)
    }
}
