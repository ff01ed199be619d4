use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Signed amount represented as an integer number of **minor units**.
///
/// Use this type for **all** monetary values crossing the engine boundary
/// (balances, projections, trial balance totals) to avoid floating-point
/// drift. The ledger is mono-currency, so no currency is attached.
///
/// Balances returned by the projector are *normal-positive*: a positive value
/// means the account carries a balance on its normal side.
///
/// Arithmetic is checked only. There are no operator impls, so every sum
/// has to decide what an overflow means.
///
/// # Examples
///
/// ```rust
/// use ledger::Amount;
///
/// let amount = Amount::new(1_000_000);
/// assert_eq!(amount.minor(), 1_000_000);
/// assert_eq!(amount.to_string(), "1000000");
/// assert_eq!("-250".parse::<Amount>().unwrap().minor(), -250);
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Sums minor-unit values, failing with `InvalidAmount` on overflow.
    ///
    /// `what` names the total in the error message.
    pub fn total(values: impl IntoIterator<Item = i64>, what: &str) -> ResultEngine<Amount> {
        values
            .into_iter()
            .try_fold(0_i64, |acc, value| acc.checked_add(value))
            .map(Amount)
            .ok_or_else(|| EngineError::InvalidAmount(format!("{what} overflow")))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses whole minor units, with an optional sign and `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (negative, digits) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let digits: String = digits.chars().filter(|c| *c != '_').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: i64 = digits.parse().map_err(|_| invalid())?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_sign_and_separators() {
        assert_eq!("10".parse::<Amount>().unwrap().minor(), 10);
        assert_eq!("+1_000_000".parse::<Amount>().unwrap().minor(), 1_000_000);
        assert_eq!(" -5 ".parse::<Amount>().unwrap().minor(), -5);
    }

    #[test]
    fn parse_rejects_decimals_and_garbage() {
        assert!("12.5".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn checked_ops_detect_overflow() {
        assert_eq!(Amount::new(i64::MAX).checked_add(Amount::new(1)), None);
        assert_eq!(Amount::new(i64::MIN).checked_sub(Amount::new(1)), None);
        assert_eq!(
            Amount::new(7).checked_sub(Amount::new(10)),
            Some(Amount::new(-3))
        );
    }

    #[test]
    fn total_reports_overflow_instead_of_wrapping() {
        assert_eq!(Amount::total([1, 2, 3], "debit").unwrap(), Amount::new(6));
        assert_eq!(Amount::total([], "debit").unwrap(), Amount::ZERO);

        let err = Amount::total([i64::MAX, 1], "trial balance debit").unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(msg) if msg.contains("trial balance")));
    }
}
