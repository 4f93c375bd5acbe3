//! Amounts
//!
//! An [`Amount`] has no unit of its own; it is denominated in the unit of the
//! wallet that produced it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount Error
#[derive(Debug, Error)]
pub enum Error {
    /// Amount overflow
    #[error("Amount overflow")]
    AmountOverflow,
    /// Invalid amount
    #[error("Invalid amount: `{0}`")]
    InvalidAmount(String),
}

/// Amount in the unit of the wallet
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Amount zero
    pub const ZERO: Amount = Amount(0);

    /// Split into parts that are powers of two
    ///
    /// Each power of two appears at most once and the parts sum to the
    /// original value.
    pub fn split(&self) -> Vec<Self> {
        let sats = self.0;
        (0_u64..64)
            .rev()
            .filter_map(|bit| {
                let part = 1 << bit;
                ((sats & part) == part).then_some(Self::from(part))
            })
            .collect()
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Try to sum iterator of [`Amount`]
    pub fn try_sum<I>(iter: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Self>,
    {
        iter.into_iter().try_fold(Amount::ZERO, |acc, x| {
            acc.checked_add(x).ok_or(Error::AmountOverflow)
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<u64>()
            .map_err(|_| Error::InvalidAmount(s.to_owned()))?;
        Ok(Amount(value))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0.checked_add(rhs.0).expect("Addition error"))
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_amount() {
        assert_eq!(Amount::from(1).split(), vec![Amount::from(1)]);
        assert_eq!(Amount::from(2).split(), vec![Amount::from(2)]);
        assert_eq!(
            Amount::from(3).split(),
            vec![Amount::from(2), Amount::from(1)]
        );
        let amounts: Vec<Amount> = [64, 32, 4].iter().map(|a| Amount::from(*a)).collect();
        assert_eq!(Amount::from(100).split(), amounts);
        let amounts: Vec<Amount> = [64, 32, 8, 1].iter().map(|a| Amount::from(*a)).collect();
        assert_eq!(Amount::from(105).split(), amounts);
        assert_eq!(Amount::ZERO.split(), vec![]);
    }

    #[test]
    fn test_split_sums_and_powers() {
        for value in [1_u64, 7, 100, 255, 1023, 4096, 999_999] {
            let parts = Amount::from(value).split();
            let sum = Amount::try_sum(parts.iter().copied()).unwrap();
            assert_eq!(sum, Amount::from(value));
            for part in &parts {
                assert!(u64::from(*part).is_power_of_two());
            }
            // each chunk size at most once
            let mut seen = parts.clone();
            seen.dedup();
            assert_eq!(seen.len(), parts.len());
        }
    }

    #[test]
    fn test_try_sum_overflow() {
        assert!(Amount::try_sum([Amount::from(u64::MAX), Amount::from(1)]).is_err());
    }
}
