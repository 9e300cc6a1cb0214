//! Fixed-point codec for money amounts
//!
//! Homomorphic arithmetic runs over integers, so every decimal amount is
//! carried as an integer multiple of `1 / scale`. The number of scale factors
//! folded into a value is its [`ScaleExponent`]: freshly encoded amounts carry
//! exponent 1, and a product of two exponent-1 values carries exponent 2.
//!
//! Decimals are rounded half away from zero. Conversion goes through the
//! shortest decimal rendering of the `f64`, so `150.075` scales to `15008`
//! rather than to whatever its binary approximation happens to round to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scale factor used when none is configured: two decimal places.
pub const DEFAULT_SCALE_FACTOR: u64 = 100;

/// Number of scale factors multiplied into a scaled integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScaleExponent(u32);

impl ScaleExponent {
    /// Exponent of an amount straight out of the codec.
    pub const BASE: ScaleExponent = ScaleExponent(1);

    pub const fn new(exponent: u32) -> Self {
        Self(exponent)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Exponent after addition or subtraction: both sides must agree.
    pub fn additive(self, rhs: ScaleExponent) -> Result<ScaleExponent> {
        if self != rhs {
            return Err(Error::ScaleMismatch { lhs: self, rhs });
        }
        Ok(self)
    }

    /// Exponent after multiplication: exponents add.
    pub fn multiplicative(self, rhs: ScaleExponent) -> Result<ScaleExponent> {
        self.0
            .checked_add(rhs.0)
            .map(ScaleExponent)
            .ok_or_else(|| Error::validation("scale exponent overflow"))
    }
}

impl fmt::Display for ScaleExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s^{}", self.0)
    }
}

/// Integer representation of a decimal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledAmount {
    pub value: i64,
    pub exponent: ScaleExponent,
}

impl ScaledAmount {
    pub fn new(value: i64, exponent: ScaleExponent) -> Self {
        Self { value, exponent }
    }

    pub fn combine_add(self, rhs: ScaledAmount) -> Result<ScaledAmount> {
        let exponent = self.exponent.additive(rhs.exponent)?;
        let value = self
            .value
            .checked_add(rhs.value)
            .ok_or_else(|| Error::validation("scaled addition overflow"))?;
        Ok(ScaledAmount { value, exponent })
    }

    pub fn combine_sub(self, rhs: ScaledAmount) -> Result<ScaledAmount> {
        let exponent = self.exponent.additive(rhs.exponent)?;
        let value = self
            .value
            .checked_sub(rhs.value)
            .ok_or_else(|| Error::validation("scaled subtraction overflow"))?;
        Ok(ScaledAmount { value, exponent })
    }

    pub fn combine_mul(self, rhs: ScaledAmount) -> Result<ScaledAmount> {
        let exponent = self.exponent.multiplicative(rhs.exponent)?;
        let value = self
            .value
            .checked_mul(rhs.value)
            .ok_or_else(|| Error::validation("scaled multiplication overflow"))?;
        Ok(ScaledAmount { value, exponent })
    }
}

/// Converts between decimal amounts and [`ScaledAmount`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPointCodec {
    scale_factor: u64,
}

impl FixedPointCodec {
    pub fn new(scale_factor: u64) -> Result<Self> {
        if scale_factor == 0 || scale_factor > i64::MAX as u64 {
            return Err(Error::validation(format!(
                "scale factor must be in 1..=i64::MAX, got {}",
                scale_factor
            )));
        }
        Ok(Self { scale_factor })
    }

    pub fn scale_factor(&self) -> u64 {
        self.scale_factor
    }

    /// Scale a decimal, rounding half away from zero. The result has exponent 1.
    pub fn to_scaled(&self, decimal: f64) -> Result<ScaledAmount> {
        if !decimal.is_finite() {
            return Err(Error::validation(format!(
                "amount {} is not a finite number",
                decimal
            )));
        }
        self.parse_scaled(&decimal.to_string())
    }

    /// Scale a decimal given in plain notation (`-12`, `450.5`, `.25`).
    ///
    /// The arithmetic is exact: no binary floating point is involved.
    pub fn parse_scaled(&self, text: &str) -> Result<ScaledAmount> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        let well_formed = !(int_part.is_empty() && frac_part.is_empty())
            && int_part.bytes().all(|b| b.is_ascii_digit())
            && frac_part.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(Error::validation(format!("'{}' is not a decimal amount", text)));
        }

        let overflow = || Error::validation(format!("amount '{}' overflows the scaled range", text));
        let scale = self.scale_factor as i128;

        let mut whole: i128 = 0;
        for b in int_part.bytes() {
            whole = whole
                .checked_mul(10)
                .and_then(|w| w.checked_add((b - b'0') as i128))
                .ok_or_else(overflow)?;
        }

        // Fractional precision is capped at 18 digits.
        let frac_part = &frac_part[..frac_part.len().min(18)];
        let mut numerator: i128 = 0;
        let mut denominator: i128 = 1;
        for b in frac_part.bytes() {
            numerator = numerator * 10 + (b - b'0') as i128;
            denominator *= 10;
        }

        // round(numerator * scale / denominator), half away from zero on the magnitude
        let frac_scaled = (numerator.checked_mul(scale).ok_or_else(overflow)? * 2 + denominator)
            / (2 * denominator);
        let magnitude = whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac_scaled))
            .ok_or_else(overflow)?;
        let value = if negative { -magnitude } else { magnitude };
        let value = i64::try_from(value).map_err(|_| overflow())?;

        Ok(ScaledAmount::new(value, ScaleExponent::BASE))
    }

    /// Descale back to a decimal: `value / scale^exponent`.
    pub fn from_scaled(&self, amount: ScaledAmount) -> f64 {
        let divisor = (self.scale_factor as f64).powi(amount.exponent.get() as i32);
        amount.value as f64 / divisor
    }
}

impl Default for FixedPointCodec {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }
}
