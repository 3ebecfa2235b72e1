//! Value types compared by value, not identity.

use serde::{Deserialize, Serialize};

/// Monetary amount in the smallest currency unit (e.g. cents).
///
/// Order amounts are computed once at checkout and never recomputed by the
/// lifecycle engine, so only the operations needed to total an order exist.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(amount: u64) -> Self {
        Self(amount)
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: u32) -> Option<Money> {
        self.0.checked_mul(u64::from(factor)).map(Money)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_compares_by_value() {
        assert_eq!(Money::from_minor(1250), Money::from_minor(1250));
        assert_eq!(Money::from_minor(1250).to_string(), "12.50");
    }

    #[test]
    fn arithmetic_is_overflow_checked() {
        assert_eq!(Money::from_minor(300).checked_mul(3), Some(Money::from_minor(900)));
        assert_eq!(Money::from_minor(u64::MAX).checked_add(Money::from_minor(1)), None);
    }
}
