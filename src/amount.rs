//! Rational decimal amounts and currency codes.
//!
//! The wire protocol represents every amount and price as an exact
//! fraction `num/den` rather than a floating-point decimal, so that
//! hop-by-hop reductions (partial fills, credit clamps) never accumulate
//! rounding error. [`Fraction`] is the Rust-native rendition of that
//! wire type: always kept in lowest terms with a strictly positive
//! denominator.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

use crate::error::CoreError;

/// An exact rational number, kept in lowest terms with `den > 0`.
#[derive(Clone, Copy, Debug, Eq)]
pub struct Fraction {
    num: i64,
    den: i64,
}

impl Fraction {
    /// The additive identity.
    pub const ZERO: Fraction = Fraction { num: 0, den: 1 };

    /// Builds a new fraction, reducing it to lowest terms and normalizing
    /// the sign onto the numerator.
    ///
    /// Returns [`CoreError::Protocol`] if `den == 0`.
    pub fn new(num: i64, den: i64) -> Result<Self, CoreError> {
        if den == 0 {
            return Err(CoreError::Protocol("fraction with zero denominator".into()));
        }
        let (mut num, mut den) = (num, den);
        if den < 0 {
            num = -num;
            den = -den;
        }
        let divisor = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1);
        Ok(Fraction {
            num: num / divisor as i64,
            den: den / divisor as i64,
        })
    }

    /// Builds a fraction from a whole number.
    pub fn from_int(n: i64) -> Self {
        Fraction { num: n, den: 1 }
    }

    /// The reduced numerator.
    pub fn numerator(&self) -> i64 {
        self.num
    }

    /// The reduced, strictly positive denominator.
    pub fn denominator(&self) -> i64 {
        self.den
    }

    /// `true` if this fraction is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// `true` if this fraction is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    /// Multiplies by a whole-number scalar without losing precision.
    pub fn scale(&self, n: i64) -> Result<Self, CoreError> {
        Fraction::new(
            self.num
                .checked_mul(n)
                .ok_or_else(|| CoreError::Protocol("fraction overflow".into()))?,
            self.den,
        )
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.num as i128 * other.den as i128 == other.num as i128 * self.den as i128
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl Add for Fraction {
    type Output = Result<Fraction, CoreError>;

    fn add(self, rhs: Fraction) -> Self::Output {
        Fraction::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
}

impl Sub for Fraction {
    type Output = Result<Fraction, CoreError>;

    fn sub(self, rhs: Fraction) -> Self::Output {
        Fraction::new(self.num * rhs.den - rhs.num * self.den, self.den * rhs.den)
    }
}

impl Mul for Fraction {
    type Output = Result<Fraction, CoreError>;

    fn mul(self, rhs: Fraction) -> Self::Output {
        Fraction::new(self.num * rhs.num, self.den * rhs.den)
    }
}

impl Div for Fraction {
    type Output = Result<Fraction, CoreError>;

    fn div(self, rhs: Fraction) -> Self::Output {
        if rhs.num == 0 {
            return Err(CoreError::Protocol("division by zero fraction".into()));
        }
        Fraction::new(self.num * rhs.den, self.den * rhs.num)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Fraction {
    type Err = CoreError;

    /// Parses the wire schema's `num/den` literal notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num_s, den_s) = s
            .split_once('/')
            .ok_or_else(|| CoreError::Protocol(format!("malformed fraction: {}", s)))?;
        let num: i64 = num_s
            .parse()
            .map_err(|_| CoreError::Protocol(format!("malformed fraction numerator: {}", s)))?;
        let den: i64 = den_s
            .parse()
            .map_err(|_| CoreError::Protocol(format!("malformed fraction denominator: {}", s)))?;
        Fraction::new(num, den)
    }
}

/// A short currency identifier, e.g. `"USD"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Builds a new currency code from its ASCII symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        CurrencyCode(symbol.into())
    }

    /// The underlying symbol, e.g. `"USD"`.
    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_to_lowest_terms() {
        let f = Fraction::new(2, 4).unwrap();
        assert_eq!(f.numerator(), 1);
        assert_eq!(f.denominator(), 2);
    }

    #[test]
    fn normalizes_sign_onto_numerator() {
        let f = Fraction::new(1, -2).unwrap();
        assert_eq!(f.numerator(), -1);
        assert_eq!(f.denominator(), 2);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert!(Fraction::new(1, 0).is_err());
    }

    #[test]
    fn display_round_trip() {
        let f = Fraction::new(100, 1).unwrap();
        assert_eq!(f.to_string(), "100/1");
        let parsed: Fraction = "100/1".parse().unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn price_division() {
        let fiat = Fraction::new(100, 1).unwrap();
        let btc = Fraction::new(1, 1).unwrap();
        let price = (fiat / btc).unwrap();
        assert_eq!(price, Fraction::new(100, 1).unwrap());
    }

    #[test]
    fn ordering_across_denominators() {
        let half = Fraction::new(1, 2).unwrap();
        let third = Fraction::new(1, 3).unwrap();
        assert!(half > third);
    }
}
