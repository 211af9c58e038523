//! Unsequenced reference ledger, used only to show the race the
//! `SequencedLedger` prevents.
//!
//! Reads and writes each take the map lock on their own, so a
//! read-modify-write is two separate critical sections and concurrent
//! clients can overwrite each other.

use parking_lot::Mutex;
use seqlock_ledger::{AccountId, Balance, Ledger, LedgerError, ResizableChainTable};

pub struct NaiveLedger {
    table: Mutex<ResizableChainTable<AccountId, Balance>>,
}

impl NaiveLedger {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ResizableChainTable::new()),
        }
    }

    pub fn open_account(&self, id: AccountId, balance: Balance) {
        self.write(id, balance);
    }

    pub fn read(&self, id: AccountId) -> Result<Balance, LedgerError> {
        self.table
            .lock()
            .get(&id)
            .copied()
            .ok_or(LedgerError::UnknownAccount(id))
    }

    pub fn write(&self, id: AccountId, balance: Balance) {
        self.table.lock().put(id, balance);
    }
}

impl Ledger for NaiveLedger {
    fn withdraw(&self, id: AccountId, amount: Balance) -> Result<bool, LedgerError> {
        let balance = self.read(id)?;
        if balance > amount {
            self.write(id, balance - amount);
            return Ok(true);
        }
        Ok(false)
    }

    fn deposit(&self, id: AccountId, amount: Balance) -> Result<(), LedgerError> {
        let balance = self.read(id)?;
        self.write(id, balance + amount);
        Ok(())
    }

    fn balance(&self, id: AccountId) -> Result<Balance, LedgerError> {
        self.read(id)
    }

    fn name(&self) -> &'static str {
        "naive"
    }
}
