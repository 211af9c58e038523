//! Core types shared by the ledger and its callers.

use std::fmt;

/// Account identifier, dense in `[0, population)`.
pub type AccountId = usize;

/// Monetary amount in minor units (the last two digits are cents).
pub type Balance = i64;

/// Upper bound on lock acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinLimit {
    /// Retry forever. This is the production behaviour.
    #[default]
    Unbounded,
    /// Give up after this many attempts.
    Attempts(u64),
}

impl SpinLimit {
    /// Returns true if `attempts` has used up the budget.
    pub fn exhausted(&self, attempts: u64) -> bool {
        match self {
            SpinLimit::Unbounded => false,
            SpinLimit::Attempts(max) => attempts >= *max,
        }
    }
}

/// Formats minor units as dollars, e.g. `12345` as `$123.45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dollars(pub Balance);

impl fmt::Display for Dollars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars_display() {
        assert_eq!(Dollars(12345).to_string(), "$123.45");
        assert_eq!(Dollars(7).to_string(), "$0.07");
        assert_eq!(Dollars(-250).to_string(), "-$2.50");
    }

    #[test]
    fn test_spin_limit() {
        assert!(!SpinLimit::Unbounded.exhausted(u64::MAX));
        assert!(!SpinLimit::Attempts(3).exhausted(2));
        assert!(SpinLimit::Attempts(3).exhausted(3));
    }
}
