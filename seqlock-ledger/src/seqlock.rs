//! Parity spin-lock.
//!
//! A single counter guards the data: an even value means free, an odd value
//! means held. Acquiring reads the counter, busy-spins while it is odd, and
//! tries one compare-and-swap from `s` to `s + 1` when it is even. Releasing
//! increments the counter again, so it only ever grows.
//!
//! There is no queueing, so a thread can lose every race for an arbitrarily
//! long time under contention.

use crate::error::LedgerError;
use crate::types::SpinLimit;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Spin-lock protecting a value of type `T` with a parity word.
pub struct ParityLock<T> {
    word: AtomicU64,
    acquisitions: AtomicU64,
    failed_cas: AtomicU64,
    held_spins: AtomicU64,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only handed out through a `ParityGuard`, and a
// guard exists only while the word is odd, which one thread at a time can
// achieve via the compare-and-swap.
unsafe impl<T: Send> Send for ParityLock<T> {}
unsafe impl<T: Send> Sync for ParityLock<T> {}

/// Counters describing how contended a [`ParityLock`] has been.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Successful acquisitions.
    pub acquisitions: u64,
    /// Compare-and-swap attempts that lost to another thread.
    pub failed_cas: u64,
    /// Reads that found the lock already held.
    pub held_spins: u64,
}

impl<T> ParityLock<T> {
    /// Wraps `data` in an unlocked lock.
    pub fn new(data: T) -> Self {
        Self {
            word: AtomicU64::new(0),
            acquisitions: AtomicU64::new(0),
            failed_cas: AtomicU64::new(0),
            held_spins: AtomicU64::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Spins until the lock is held or `limit` attempts have been made.
    ///
    /// With [`SpinLimit::Unbounded`] this never returns an error.
    pub fn lock(&self, limit: SpinLimit) -> Result<ParityGuard<'_, T>, LedgerError> {
        let mut attempts = 0u64;
        let mut failed_cas = 0u64;
        let mut held_spins = 0u64;

        loop {
            if limit.exhausted(attempts) {
                self.record(failed_cas, held_spins);
                return Err(LedgerError::SpinLimitExceeded { attempts });
            }
            attempts += 1;

            let s = self.word.load(Ordering::Acquire);
            if s & 1 == 1 {
                held_spins += 1;
                std::hint::spin_loop();
                continue;
            }

            if self
                .word
                .compare_exchange(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.acquisitions.fetch_add(1, Ordering::Relaxed);
                self.record(failed_cas, held_spins);
                return Ok(ParityGuard {
                    lock: self,
                    _not_send: PhantomData,
                });
            }
            failed_cas += 1;
        }
    }

    /// Current value of the parity word.
    pub fn word(&self) -> u64 {
        self.word.load(Ordering::Acquire)
    }

    /// Returns true if some thread holds the lock right now.
    pub fn is_locked(&self) -> bool {
        self.word() & 1 == 1
    }

    /// Contention counters accumulated so far.
    pub fn stats(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            failed_cas: self.failed_cas.load(Ordering::Relaxed),
            held_spins: self.held_spins.load(Ordering::Relaxed),
        }
    }

    /// Mutable access without locking, available when the caller owns the lock.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn record(&self, failed_cas: u64, held_spins: u64) {
        if failed_cas > 0 {
            self.failed_cas.fetch_add(failed_cas, Ordering::Relaxed);
        }
        if held_spins > 0 {
            self.held_spins.fetch_add(held_spins, Ordering::Relaxed);
        }
    }
}

impl<T> fmt::Debug for ParityLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParityLock")
            .field("word", &self.word())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Proof that the lock is held. Dropping it releases the lock.
///
/// A guard stays on the thread that acquired it, and can be shared between
/// threads only when `T` itself is `Sync`:
///
/// ```compile_fail
/// use seqlock_ledger::{ParityLock, SpinLimit};
/// use std::cell::Cell;
///
/// fn assert_sync<S: Sync>(_: &S) {}
///
/// let lock = ParityLock::new(Cell::new(0u32));
/// let guard = lock.lock(SpinLimit::Unbounded).unwrap();
/// assert_sync(&guard);
/// ```
#[derive(Debug)]
pub struct ParityGuard<'a, T> {
    lock: &'a ParityLock<T>,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: a shared guard only hands out `&T`, which is fine across threads
// exactly when `T: Sync`.
unsafe impl<T: Sync> Sync for ParityGuard<'_, T> {}

impl<T> Deref for ParityGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard is the only live path to `data` while the word is odd.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for ParityGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; `&mut self` keeps the borrow unique.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for ParityGuard<'_, T> {
    fn drop(&mut self) {
        // Odd -> even.
        self.lock.word.fetch_add(1, Ordering::Release);
    }
}
