use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "NGN";

const MINOR_UNITS: i64 = 100;

//--------------------------------------        Money        ---------------------------------------------------------
/// A monetary amount, held as an integer number of minor units (kobo, cents) so that totals add up exactly.
///
/// Amounts are displayed and serialized with two decimal places, e.g. `Money::from_major(4500)` is `"4500.00"`.
/// Deserialization accepts either a decimal string or a JSON number, since payment providers are not consistent about
/// which one they send.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    /// Interprets the value as minor units.
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Money {
    pub fn from_minor(value: i64) -> Self {
        Self(value)
    }

    pub fn from_major(value: i64) -> Self {
        Self(value * MINOR_UNITS)
    }

    /// The amount in minor units.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` if the sum does not fit.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// The price of `quantity` units at this unit price. `None` if the result does not fit.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    /// Adds up the amounts, or returns `None` as soon as the running total no longer fits.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }

    /// Apply a rate expressed in basis points (1/100th of a percent), rounding half away from zero. `None` if the
    /// result does not fit.
    pub fn apply_basis_points(&self, bps: u32) -> Option<Self> {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = (scaled + scaled.signum() * 5_000) / 10_000;
        i64::try_from(rounded).ok().map(Self)
    }

    /// Converts a floating point amount in major units. Used for provider payloads that send bare JSON numbers.
    pub fn try_from_major_f64(value: f64) -> Result<Self, MoneyConversionError> {
        if !value.is_finite() {
            return Err(MoneyConversionError(value.to_string()));
        }
        let minor = (value * MINOR_UNITS as f64).round();
        if minor.abs() > i64::MAX as f64 {
            return Err(MoneyConversionError(value.to_string()));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(minor as i64))
    }

    /// The amount in major units as a float, for providers that expect a JSON number.
    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / MINOR_UNITS as f64
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses `"4500"`, `"4500.5"` and `"4500.50"`. More than two decimal places is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoneyConversionError(s.to_string());
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse::<i64>().map_err(|_| err())?,
        };
        let minor = whole.checked_mul(MINOR_UNITS).and_then(|w| w.checked_add(frac)).ok_or_else(err)?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MINOR_UNITS.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / unit, abs % unit)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Text(String),
            Integer(i64),
            Float(f64),
        }
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(s) => Money::from_str(&s).map_err(de::Error::custom),
            RawAmount::Integer(v) => v
                .checked_mul(MINOR_UNITS)
                .map(Money)
                .ok_or_else(|| de::Error::custom(MoneyConversionError(v.to_string()))),
            RawAmount::Float(v) => Money::try_from_major_f64(v).map_err(de::Error::custom),
        }
    }
}
