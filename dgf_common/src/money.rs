use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "USD";
pub const USD_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------        Money        ---------------------------------------------------------

/// A monetary amount in hundredths of the base unit (cents).
///
/// All prices in the workspace are carried as integer cents so that the "round to 2 decimals" rule is a representation
/// invariant rather than a floating-point afterthought. Conversions from `f64` happen exactly once, at the edge where
/// a price is produced (vendor response, FX conversion, markup application).
#[derive(Debug, Clone, Copy, Default, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<f64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(MoneyConversionError(format!("{value} is not a finite number")));
        }
        let cents = (value * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{value} is too large to represent in cents")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal price string, e.g. `"12.34"`, `"7"`, or `"-0.05"`. Anything beyond two decimals is rejected
    /// rather than silently truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, s),
        };
        let mut parts = digits.split('.');
        let whole = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MoneyConversionError(format!("Invalid price value: {s}")))?
            .parse::<i64>()
            .map_err(|e| MoneyConversionError(format!("Invalid price value: {s}. {e}.")))?;
        let cents = match parts.next() {
            None => 0,
            Some(frac) if frac.len() <= 2 && !frac.is_empty() => {
                let f = frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("Invalid price value: {s}. {e}.")))?;
                if frac.len() == 1 {
                    f * 10
                } else {
                    f
                }
            },
            Some(_) => return Err(MoneyConversionError(format!("More than two decimals in price value: {s}"))),
        };
        if parts.next().is_some() {
            return Err(MoneyConversionError(format!("Invalid price value: {s}")));
        }
        Ok(Self(sign * (whole * 100 + cents)))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    /// The amount in cents.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_rounding() {
        assert_eq!(format!("{}", Money::from(4005)), "40.05");
        assert_eq!(format!("{}", Money::from(-4005)), "-40.05");
        assert_eq!(format!("{}", Money::from_units(60)), "60.00");
        assert_eq!(format!("{}", Money::from(9)), "0.09");
    }

    #[test]
    fn from_f64_rounds_to_cents() {
        assert_eq!(Money::try_from(12.344).unwrap(), Money::from(1234));
        assert_eq!(Money::try_from(12.345).unwrap(), Money::from(1235));
        assert_eq!(Money::try_from(-0.005).unwrap(), Money::from(-1));
        assert!(Money::try_from(f64::NAN).is_err());
        assert!(Money::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn parse_decimal_strings() {
        assert_eq!("12.34".parse::<Money>().unwrap(), Money::from(1234));
        assert_eq!("7".parse::<Money>().unwrap(), Money::from_units(7));
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from(50));
        assert_eq!("-0.05".parse::<Money>().unwrap(), Money::from(-5));
        assert!("12.345".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
    }

    #[test]
    fn arithmetic() {
        let a = Money::from(150);
        let b = Money::from(49);
        assert_eq!(a + b, Money::from(199));
        assert_eq!(a - b, Money::from(101));
        assert_eq!(-a, Money::from(-150));
        assert_eq!(a * 3, Money::from(450));
        assert_eq!((b - a).abs(), Money::from(101));
        assert_eq!(vec![a, b].into_iter().sum::<Money>(), Money::from(199));
    }
}
