//! Account snapshots and admission control.
//!
//! The directory holds the latest installed snapshot for every account and a
//! fixed array of in-flight slots. An account id occupies at most one slot,
//! and the generator only dispatches accounts whose id is in no slot.

use crate::{Account, BankError};
use parking_lot::Mutex;
use rand::Rng;
use seqlock_ledger::{AccountId, SpinLimit};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed population of account snapshots plus the in-flight marker set.
#[derive(Debug)]
pub struct AccountDirectory {
    accounts: Vec<Mutex<Account>>,
    in_flight: Mutex<Vec<Option<AccountId>>>,
    installs: Vec<AtomicUsize>,
}

impl AccountDirectory {
    /// Creates a directory from snapshots whose ids are `0..accounts.len()` in order.
    pub fn new(accounts: Vec<Account>) -> Result<Self, BankError> {
        if accounts.is_empty() {
            return Err(BankError::EmptyPopulation);
        }
        if let Some((idx, account)) = accounts
            .iter()
            .enumerate()
            .find(|(idx, account)| account.id != *idx)
        {
            return Err(BankError::InvalidConfig(format!(
                "account at index {idx} has id {}",
                account.id
            )));
        }

        let len = accounts.len();
        Ok(Self {
            accounts: accounts.into_iter().map(Mutex::new).collect(),
            in_flight: Mutex::new(vec![None; len]),
            installs: (0..len).map(|_| AtomicUsize::new(0)).collect(),
        })
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Always false; a directory cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Samples random accounts until one is not in flight and returns its index.
    ///
    /// With [`SpinLimit::Unbounded`] this loops for as long as every account is
    /// busy. There is no wakeup when a marker clears; the loop just samples again.
    pub fn find_idle_account<R: Rng>(
        &self,
        rng: &mut R,
        limit: SpinLimit,
    ) -> Result<usize, BankError> {
        let mut attempts = 0u64;
        loop {
            if limit.exhausted(attempts) {
                return Err(BankError::NoIdleAccount { attempts });
            }
            attempts += 1;

            // Ids equal indices, checked in `new`.
            let idx = rng.gen_range(0..self.accounts.len());
            if !self.is_in_flight(idx) {
                return Ok(idx);
            }
        }
    }

    /// Records that a task for `id` has been dispatched.
    pub fn mark_in_flight(&self, id: AccountId) -> Result<(), BankError> {
        self.check_id(id)?;
        let mut slots = self.in_flight.lock();
        if slots.iter().any(|slot| *slot == Some(id)) {
            return Err(BankError::AlreadyInFlight(id));
        }
        let free = slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(BankError::MarkerSetFull)?;
        *free = Some(id);
        Ok(())
    }

    /// Records that the task for `id` has been reconciled.
    pub fn clear_in_flight(&self, id: AccountId) -> Result<(), BankError> {
        let mut slots = self.in_flight.lock();
        let slot = slots
            .iter_mut()
            .find(|slot| **slot == Some(id))
            .ok_or(BankError::NotInFlight(id))?;
        *slot = None;
        Ok(())
    }

    /// Returns true if `id` currently occupies a slot.
    pub fn is_in_flight(&self, id: AccountId) -> bool {
        self.in_flight.lock().iter().any(|slot| *slot == Some(id))
    }

    /// Number of occupied slots.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Replaces the stored snapshot for `account.id`.
    pub fn install(&self, account: Account) -> Result<(), BankError> {
        self.check_id(account.id)?;
        *self.accounts[account.id].lock() = account;
        self.installs[account.id].fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Latest installed snapshot for `id`.
    pub fn snapshot(&self, id: AccountId) -> Result<Account, BankError> {
        self.check_id(id)?;
        Ok(*self.accounts[id].lock())
    }

    /// Latest installed snapshot of every account, in id order.
    pub fn snapshots(&self) -> Vec<Account> {
        self.accounts.iter().map(|account| *account.lock()).collect()
    }

    /// How many times a snapshot has been installed for `id`.
    pub fn install_count(&self, id: AccountId) -> Result<usize, BankError> {
        self.check_id(id)?;
        Ok(self.installs[id].load(Ordering::Acquire))
    }

    fn check_id(&self, id: AccountId) -> Result<(), BankError> {
        if id < self.accounts.len() {
            Ok(())
        } else {
            Err(BankError::UnknownAccount(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn directory(n: usize) -> AccountDirectory {
        AccountDirectory::new((0..n).map(|id| Account::new(id, 1_000)).collect()).unwrap()
    }

    #[test]
    fn test_mark_and_clear() {
        let dir = directory(4);
        dir.mark_in_flight(2).unwrap();
        assert!(dir.is_in_flight(2));
        assert_eq!(dir.in_flight_count(), 1);

        assert_eq!(dir.mark_in_flight(2), Err(BankError::AlreadyInFlight(2)));
        assert_eq!(dir.in_flight_count(), 1);

        dir.clear_in_flight(2).unwrap();
        assert!(!dir.is_in_flight(2));
        assert_eq!(dir.clear_in_flight(2), Err(BankError::NotInFlight(2)));
        assert_eq!(dir.mark_in_flight(9), Err(BankError::UnknownAccount(9)));
    }

    #[test]
    fn test_find_idle_skips_busy_accounts() {
        let dir = directory(5);
        for id in [0, 1, 3, 4] {
            dir.mark_in_flight(id).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(dir.find_idle_account(&mut rng, SpinLimit::Unbounded), Ok(2));
        }
    }

    #[test]
    fn test_find_idle_leaves_snapshots_unlocked() {
        let dir = directory(4);
        dir.mark_in_flight(1).unwrap();

        // Holding every snapshot must not stall the search.
        let _held: Vec<_> = dir.accounts.iter().map(|account| account.lock()).collect();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let idx = dir.find_idle_account(&mut rng, SpinLimit::Unbounded).unwrap();
            assert_ne!(idx, 1);
        }
    }

    #[test]
    fn test_find_idle_gives_up_when_all_busy() {
        let dir = directory(3);
        for id in 0..3 {
            dir.mark_in_flight(id).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            dir.find_idle_account(&mut rng, SpinLimit::Attempts(100)),
            Err(BankError::NoIdleAccount { attempts: 100 })
        );
    }

    #[test]
    fn test_install_replaces_snapshot() {
        let dir = directory(3);
        dir.install(Account::new(1, 42)).unwrap();

        assert_eq!(dir.snapshot(1).unwrap(), Account::new(1, 42));
        assert_eq!(dir.install_count(1).unwrap(), 1);
        assert_eq!(dir.install_count(0).unwrap(), 0);
        assert_eq!(dir.snapshots()[1].cached_balance, 42);
        assert_eq!(
            dir.install(Account::new(3, 0)),
            Err(BankError::UnknownAccount(3))
        );
    }

    #[test]
    fn test_rejects_misnumbered_accounts() {
        let accounts = vec![Account::new(0, 1), Account::new(2, 1)];
        assert!(matches!(
            AccountDirectory::new(accounts),
            Err(BankError::InvalidConfig(_))
        ));
        assert_eq!(
            AccountDirectory::new(Vec::new()).unwrap_err(),
            BankError::EmptyPopulation
        );
    }
}
