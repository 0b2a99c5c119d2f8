// SPDX-License-Identifier: BUSL-1.1
//! # Minor-Unit Money
//!
//! Fixed-point money with two fractional digits, stored as a signed 64-bit
//! count of minor units (cents). All arithmetic is checked — overflow is an
//! error surfaced to the caller, never a silent wrap.
//!
//! Parsing accepts decimal strings with at most two fractional digits
//! ("734.50", "1000", "0.05"). Anything else is rejected: the payment
//! processor and the ledger must agree to the cent, so a lossy parse is a
//! correctness bug, not a convenience.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// An amount of money in minor units (cents). Two fractional digits.
///
/// Serializes as the raw minor-unit integer so that JSON round-trips are
/// exact and the settlement calldata can embed the value directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

/// Minor units per major unit (10^2).
const MINOR_PER_MAJOR: i64 = 100;

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Construct from a raw minor-unit count.
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Construct from whole major units (e.g. `from_major(5)` == "5.00").
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Raw minor-unit count.
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Parse a decimal string with at most two fractional digits.
    ///
    /// Rejects empty input, missing digits, more than two fractional
    /// digits, and values that overflow `i64` minor units.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, trimmed),
        };

        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(ValidationError::InvalidAmount(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(ValidationError::InvalidAmount(format!(
                "{s}: more than two fractional digits"
            )));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidAmount(s.to_string()));
        }

        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ValidationError::InvalidAmount(s.to_string()))?
        };

        // Right-pad the fraction to two digits: "5" → 50 minor units.
        let frac_units: i64 = if frac.is_empty() {
            0
        } else if frac.len() == 1 {
            frac.parse::<i64>()
                .map_err(|_| ValidationError::InvalidAmount(s.to_string()))?
                * 10
        } else {
            frac.parse()
                .map_err(|_| ValidationError::InvalidAmount(s.to_string()))?
        };

        let minor = whole_units
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|w| w.checked_add(frac_units))
            .ok_or_else(|| ValidationError::InvalidAmount(format!("{s}: overflow")))?;

        Ok(Money(if negative { -minor } else { minor }))
    }

    /// Checked addition.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Smaller of two amounts.
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// True for amounts strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// True for exactly zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    /// Decimal string with exactly two fractional digits ("734.50").
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:02}",
            abs / MINOR_PER_MAJOR as u64,
            abs % MINOR_PER_MAJOR as u64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_whole_amount() {
        assert_eq!(Money::parse("1000").unwrap(), Money::from_minor(100_000));
    }

    #[test]
    fn parse_two_fraction_digits() {
        assert_eq!(Money::parse("734.50").unwrap(), Money::from_minor(73_450));
    }

    #[test]
    fn parse_one_fraction_digit_pads() {
        assert_eq!(Money::parse("1.5").unwrap(), Money::from_minor(150));
    }

    #[test]
    fn parse_leading_dot() {
        assert_eq!(Money::parse(".05").unwrap(), Money::from_minor(5));
    }

    #[test]
    fn parse_negative() {
        assert_eq!(Money::parse("-2.25").unwrap(), Money::from_minor(-225));
    }

    #[test]
    fn parse_rejects_three_fraction_digits() {
        assert!(Money::parse("1.005").is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse(".").is_err());
        assert!(Money::parse("12a").is_err());
        assert!(Money::parse("1.2.3").is_err());
        assert!(Money::parse("1e3").is_err());
    }

    #[test]
    fn display_pads_fraction() {
        assert_eq!(Money::from_minor(73_450).to_string(), "734.50");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-225).to_string(), "-2.25");
        assert_eq!(Money::from_major(12).to_string(), "12.00");
    }

    #[test]
    fn checked_add_overflow() {
        assert!(Money::from_minor(i64::MAX)
            .checked_add(Money::from_minor(1))
            .is_none());
    }

    #[test]
    fn serde_is_transparent_minor_units() {
        let m = Money::from_minor(73_450);
        assert_eq!(serde_json::to_string(&m).unwrap(), "73450");
        let back: Money = serde_json::from_str("73450").unwrap();
        assert_eq!(back, m);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(minor in -1_000_000_000_000i64..1_000_000_000_000i64) {
            let m = Money::from_minor(minor);
            let parsed = Money::parse(&m.to_string()).unwrap();
            prop_assert_eq!(parsed, m);
        }
    }
}
