//! Spin-lock sequenced account ledger.
//!
//! This crate holds the shared state of the bank simulation: a table of
//! account balances that many client threads update at once.
//!
//! # Core Components
//!
//! - **ResizableChainTable**: separate-chaining hash table that doubles at a
//!   load factor of 0.75
//! - **ParityLock**: spin-lock over a counter that is even when free and odd
//!   when held
//! - **SequencedLedger**: the table behind one global `ParityLock`, exposing
//!   withdraw and deposit
//!
//! # Example
//!
//! ```rust
//! use seqlock_ledger::{Ledger, LedgerConfig, SequencedLedger, SpinLimit};
//!
//! let ledger = SequencedLedger::with_config(LedgerConfig {
//!     spin_limit: SpinLimit::Unbounded,
//!     ..Default::default()
//! });
//! ledger.open_account(0, 1_000).unwrap();
//!
//! if !ledger.withdraw(0, 2_500).unwrap() {
//!     println!("insufficient funds");
//! }
//! ```

pub mod chain_table;
pub mod error;
pub mod ledger;
pub mod seqlock;
pub mod types;

pub use chain_table::ResizableChainTable;
pub use error::LedgerError;
pub use ledger::{Ledger, LedgerConfig, SequencedLedger};
pub use seqlock::{LockStats, ParityGuard, ParityLock};
pub use types::{AccountId, Balance, Dollars, SpinLimit};
