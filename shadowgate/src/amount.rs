//! Token amounts in an asset's smallest unit.
//!
//! Prices are held as integers of minor units (USDC has 6 decimals, so
//! `250000` is $0.25). On the wire an amount is a decimal string, because
//! JSON numbers lose precision in some clients. Human money strings such as
//! `"$0.25"` are converted with exact decimal arithmetic.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AmountError;

/// Decimal places of USDC on every supported network.
pub const USDC_DECIMALS: u32 = 6;

/// An amount of an asset in minor units. Zero means free.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinorUnits(u64);

impl MinorUnits {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw minor-unit count.
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Returns the raw minor-unit count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parses a money string such as `"$0.25"`, `"0.25"` or `"1,000"` into
    /// minor units of an asset with `decimals` decimal places.
    ///
    /// # Errors
    ///
    /// Fails on malformed or negative input, on values finer than the asset's
    /// precision, and on values that do not fit in a `u64`.
    pub fn from_money(input: &str, decimals: u32) -> Result<Self, AmountError> {
        let cleaned: String = input
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',' && *c != '_')
            .collect();
        let value =
            Decimal::from_str(&cleaned).map_err(|_| AmountError::Malformed(input.to_owned()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(input.to_owned()));
        }
        let scale = 10u64
            .checked_pow(decimals)
            .map(Decimal::from)
            .ok_or(AmountError::Overflow(input.to_owned()))?;
        let scaled = value
            .checked_mul(scale)
            .ok_or_else(|| AmountError::Overflow(input.to_owned()))?;
        if !scaled.fract().is_zero() {
            return Err(AmountError::TooPrecise {
                input: input.to_owned(),
                decimals,
            });
        }
        scaled
            .to_u64()
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(input.to_owned()))
    }

    /// The amount as a decimal in whole asset units.
    #[must_use]
    pub fn to_decimal(self, decimals: u32) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), decimals)
    }

    /// Renders the amount as a dollar string (`"$0.25"`), keeping at least
    /// two fractional digits.
    #[must_use]
    pub fn to_money(self, decimals: u32) -> String {
        let value = self.to_decimal(decimals).normalize();
        if value.scale() <= 2 {
            format!("${value:.2}")
        } else {
            format!("${value}")
        }
    }
}

impl From<u64> for MinorUnits {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MinorUnits> for u64 {
    fn from(value: MinorUnits) -> Self {
        value.0
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MinorUnits {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| AmountError::Malformed(s.to_owned()))
    }
}

impl Serialize for MinorUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MinorUnits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dollar_string() {
        let amount = MinorUnits::from_money("$0.25", USDC_DECIMALS).unwrap();
        assert_eq!(amount.get(), 250_000);
        assert_eq!(
            MinorUnits::from_money("1,000", USDC_DECIMALS).unwrap().get(),
            1_000_000_000
        );
        assert_eq!(MinorUnits::from_money("0", USDC_DECIMALS).unwrap(), MinorUnits::ZERO);
    }

    #[test]
    fn test_rejects_sub_unit_precision() {
        let err = MinorUnits::from_money("0.0000001", USDC_DECIMALS).unwrap_err();
        assert!(matches!(err, AmountError::TooPrecise { decimals: 6, .. }));
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(matches!(
            MinorUnits::from_money("-1", USDC_DECIMALS),
            Err(AmountError::Negative(_))
        ));
        assert!(matches!(
            MinorUnits::from_money("abc", USDC_DECIMALS),
            Err(AmountError::Malformed(_))
        ));
    }

    #[test]
    fn test_wire_form_is_string() {
        let json = serde_json::to_string(&MinorUnits::new(250_000)).unwrap();
        assert_eq!(json, "\"250000\"");
        let back: MinorUnits = serde_json::from_str("\"250000\"").unwrap();
        assert_eq!(back.get(), 250_000);
        assert!(serde_json::from_str::<MinorUnits>("250000").is_err());
    }

    #[test]
    fn test_to_money() {
        assert_eq!(MinorUnits::new(250_000).to_money(USDC_DECIMALS), "$0.25");
        assert_eq!(MinorUnits::new(100_000).to_money(USDC_DECIMALS), "$0.10");
        assert_eq!(MinorUnits::new(1).to_money(USDC_DECIMALS), "$0.000001");
        assert_eq!(MinorUnits::ZERO.to_money(USDC_DECIMALS), "$0.00");
    }
}
