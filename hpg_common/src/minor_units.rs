use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------    MinorUnits    -------------------------------------------------------------
/// An amount of money expressed in the smallest unit of its currency (cents for EUR/USD).
///
/// All persisted and wire-level amounts use this type so that no fractional or floating-point
/// amount ever reaches a payment provider or the database.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MinorUnitsConversionError(pub String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MinorUnits {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MinorUnits {}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        write!(f, "{whole}.{frac:02}")
    }
}

impl MinorUnits {
    /// Convert a decimal amount in major units (e.g. `120.00` EUR) into minor units (`12000`).
    ///
    /// The amount must be a finite, strictly positive number. The conversion rounds the absolute
    /// value to the nearest minor unit, so the result is always a positive integer amount.
    pub fn from_decimal(amount: f64) -> Result<Self, MinorUnitsConversionError> {
        if !amount.is_finite() {
            return Err(MinorUnitsConversionError(format!("{amount} is not a finite number")));
        }
        if amount <= 0.0 {
            return Err(MinorUnitsConversionError(format!("{amount} is not a positive amount")));
        }
        let units = (amount.abs() * 100.0).round();
        if units > i64::MAX as f64 {
            return Err(MinorUnitsConversionError(format!("{amount} is too large")));
        }
        Ok(Self(units as i64))
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}
