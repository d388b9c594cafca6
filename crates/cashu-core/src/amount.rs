//! Amounts and denominations
//!
//! Amounts are unit-less at the protocol layer; the unit comes from the
//! keyset a proof belongs to.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nuts::CurrencyUnit;

/// Amount Error
#[derive(Debug, Error)]
pub enum Error {
    /// Split Values must be less than or equal to amount
    #[error("Split values must be less than or equal to amount")]
    SplitValuesGreater,
    /// Amount overflow
    #[error("Amount overflow")]
    AmountOverflow,
    /// Cannot convert units
    #[error("Cannot convert units")]
    CannotConvertUnits,
    /// Invalid amount
    #[error("Invalid amount: `{0}`")]
    InvalidAmount(String),
}

/// Amount can be any unit
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Amount zero
    pub const ZERO: Amount = Amount(0);
    /// Amount one
    pub const ONE: Amount = Amount(1);

    /// Split into parts that are powers of two, ascending
    pub fn split(&self) -> Vec<Self> {
        let sats = self.0;
        (0_u64..64)
            .filter_map(|bit| {
                let part = 1 << bit;
                ((sats & part) == part).then_some(Self::from(part))
            })
            .collect()
    }

    /// Split into parts targeting a given shape
    pub fn split_targeted(&self, target: &SplitTarget) -> Result<Vec<Self>, Error> {
        let mut parts = match target {
            SplitTarget::None => self.split(),
            SplitTarget::Value(amount) => {
                if self.le(amount) || *amount == Amount::ZERO {
                    return Ok(self.split());
                }

                let mut parts_total = Amount::ZERO;
                let mut parts = Vec::new();

                // The powers of two needed to create the target value
                let parts_of_value = amount.split();

                'outer: while parts_total.lt(self) {
                    for part in parts_of_value.iter().copied() {
                        if (part + parts_total).le(self) {
                            parts.push(part);
                        } else {
                            let amount_left =
                                self.checked_sub(parts_total).ok_or(Error::AmountOverflow)?;
                            parts.extend(amount_left.split());
                        }

                        parts_total = Amount::try_sum(parts.clone().into_iter())?;

                        if parts_total.eq(self) {
                            break 'outer;
                        }
                    }
                }

                parts
            }
            SplitTarget::Values(values) => {
                let values_total = Amount::try_sum(values.clone().into_iter())?;

                match self.cmp(&values_total) {
                    Ordering::Equal => values.clone(),
                    Ordering::Less => return Err(Error::SplitValuesGreater),
                    Ordering::Greater => {
                        let extra = self
                            .checked_sub(values_total)
                            .ok_or(Error::AmountOverflow)?;
                        let mut values = values.clone();
                        values.extend(extra.split());
                        values
                    }
                }
            }
        };

        parts.sort();
        Ok(parts)
    }

    /// Checked addition, `None` on overflow
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction, `None` on overflow
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Try to sum up an iterator of [`Amount`]
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
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

impl From<&u64> for Amount {
    fn from(value: &u64) -> Self {
        Self(*value)
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

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl core::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Amount(iter.map(|amt| amt.0).sum())
    }
}

/// Kinds of targeting that are supported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitTarget {
    /// Default powers of two
    #[default]
    None,
    /// Amount to split each part to
    Value(Amount),
    /// Specific amounts to split into, must sum to at most the amount
    Values(Vec<Amount>),
}

/// Convert an [`Amount`] between units
pub fn to_unit<T>(amount: T, current_unit: &CurrencyUnit, target_unit: &CurrencyUnit) -> Result<Amount, Error>
where
    T: Into<u64>,
{
    let amount = amount.into();
    match (current_unit, target_unit) {
        (CurrencyUnit::Sat, CurrencyUnit::Sat) => Ok(amount.into()),
        (CurrencyUnit::Msat, CurrencyUnit::Msat) => Ok(amount.into()),
        (CurrencyUnit::Sat, CurrencyUnit::Msat) => Ok(amount
            .checked_mul(1000)
            .ok_or(Error::AmountOverflow)?
            .into()),
        (CurrencyUnit::Msat, CurrencyUnit::Sat) => Ok((amount / 1000).into()),
        (CurrencyUnit::Usd, CurrencyUnit::Usd) => Ok(amount.into()),
        (CurrencyUnit::Eur, CurrencyUnit::Eur) => Ok(amount.into()),
        (a, b) if a == b => Ok(amount.into()),
        _ => Err(Error::CannotConvertUnits),
    }
}

/// Render an [`Amount`] for display in its unit
///
/// Fiat units are denominated in cents.
pub fn format_amount(amount: Amount, unit: &CurrencyUnit) -> String {
    let value = u64::from(amount);
    match unit {
        CurrencyUnit::Sat => format!("{value} sat"),
        CurrencyUnit::Msat => format!("{value} msat"),
        CurrencyUnit::Usd => format!("{}.{:02} USD", value / 100, value % 100),
        CurrencyUnit::Eur => format!("{}.{:02} EUR", value / 100, value % 100),
        CurrencyUnit::Custom(unit) => format!("{value} {unit}"),
    }
}

/// Parse a display string produced by [`format_amount`] back into an [`Amount`]
pub fn parse_amount(s: &str, unit: &CurrencyUnit) -> Result<Amount, Error> {
    let number = s
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidAmount(s.to_owned()))?;

    match unit {
        CurrencyUnit::Usd | CurrencyUnit::Eur => {
            let (whole, cents) = number
                .split_once('.')
                .ok_or_else(|| Error::InvalidAmount(s.to_owned()))?;
            if cents.len() != 2 {
                return Err(Error::InvalidAmount(s.to_owned()));
            }
            let whole: u64 = whole
                .parse()
                .map_err(|_| Error::InvalidAmount(s.to_owned()))?;
            let cents: u64 = cents
                .parse()
                .map_err(|_| Error::InvalidAmount(s.to_owned()))?;
            whole
                .checked_mul(100)
                .and_then(|w| w.checked_add(cents))
                .map(Amount::from)
                .ok_or(Error::AmountOverflow)
        }
        _ => Amount::from_str(number),
    }
}
