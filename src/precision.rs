//! Decimal Precision Module
//!
//! All price arithmetic goes through [`PrecisionPolicy`]. Values are
//! `BigDecimal` and every quotient is rounded to the configured number of
//! significant digits, so chained divisions (reciprocal, then one-hop
//! routing) never compound binary floating-point error.
//!
//! ## Two precisions
//! - **Working precision**: significant digits kept in memory (minimum 50).
//! - **Output scale**: fixed fractional digits used only when rendering,
//!   10 for "reference per asset" and 18 for "asset per reference".
//!
//! ## Usage
//! ```rust
//! use quote_refinery::precision::{PrecisionPolicy, parse_price};
//!
//! let policy = PrecisionPolicy::default();
//! let price = parse_price("50000").unwrap();
//! let inverse = policy.reciprocal(&price).unwrap();
//! assert_eq!(policy.render_asset_per_reference(&inverse), "0.000020000000000000");
//! ```

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use num_bigint::Sign;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lowest accepted working precision (significant digits).
pub const MIN_WORKING_DIGITS: u64 = 50;

/// Default fractional digits for "reference per asset" output.
pub const DEFAULT_REFERENCE_PER_ASSET_SCALE: u32 = 10;

/// Default fractional digits for "asset per reference" output.
pub const DEFAULT_ASSET_PER_REFERENCE_SCALE: u32 = 18;

/// Largest decimal exponent magnitude accepted from input text.
pub const MAX_INPUT_EXPONENT: i64 = 1000;

// ============================================================================
// Error Types
// ============================================================================

/// Decimal conversion / arithmetic errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrecisionError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Value must be positive: {0}")]
    NonPositive(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Policy
// ============================================================================

/// Precision regime for one run.
///
/// Passed explicitly to every calculator; two regimes can coexist in the
/// same process (tests do this).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionPolicy {
    /// Significant digits kept after every division
    pub working_digits: u64,
    /// Fractional digits when rendering "reference per asset"
    pub reference_per_asset_scale: u32,
    /// Fractional digits when rendering "asset per reference"
    pub asset_per_reference_scale: u32,
}

impl Default for PrecisionPolicy {
    fn default() -> Self {
        Self {
            working_digits: MIN_WORKING_DIGITS,
            reference_per_asset_scale: DEFAULT_REFERENCE_PER_ASSET_SCALE,
            asset_per_reference_scale: DEFAULT_ASSET_PER_REFERENCE_SCALE,
        }
    }
}

impl PrecisionPolicy {
    /// Reject regimes below the minimum working precision.
    pub fn validate(&self) -> Result<(), String> {
        if self.working_digits < MIN_WORKING_DIGITS {
            return Err(format!(
                "working_digits must be at least {}, got {}",
                MIN_WORKING_DIGITS, self.working_digits
            ));
        }
        Ok(())
    }

    /// `numerator / denominator`, rounded to working precision.
    pub fn divide(
        &self,
        numerator: &BigDecimal,
        denominator: &BigDecimal,
    ) -> Result<BigDecimal, PrecisionError> {
        if denominator.is_zero() {
            return Err(PrecisionError::DivisionByZero);
        }
        Ok((numerator / denominator).with_prec(self.working_digits))
    }

    /// `1 / value`, rounded to working precision.
    pub fn reciprocal(&self, value: &BigDecimal) -> Result<BigDecimal, PrecisionError> {
        self.divide(&BigDecimal::from(1), value)
    }

    /// Round an input value to working precision without dividing.
    pub fn normalize(&self, value: &BigDecimal) -> BigDecimal {
        value.with_prec(self.working_digits)
    }

    pub fn render_reference_per_asset(&self, value: &BigDecimal) -> String {
        format_fixed(value, self.reference_per_asset_scale)
    }

    pub fn render_asset_per_reference(&self, value: &BigDecimal) -> String {
        format_fixed(value, self.asset_per_reference_scale)
    }
}

// ============================================================================
// Parse / Format
// ============================================================================

/// Parse a price string into a strictly positive decimal.
///
/// Accepts plain and scientific notation (`"0.005"`, `"5e-3"`), since
/// exchange payloads use both. Exponents beyond [`MAX_INPUT_EXPONENT`]
/// are rejected.
pub fn parse_price(raw: &str) -> Result<BigDecimal, PrecisionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PrecisionError::InvalidFormat("empty string".into()));
    }
    let value =
        BigDecimal::from_str(raw).map_err(|_| PrecisionError::InvalidFormat(raw.to_string()))?;
    // Rendering pads zeros up to the exponent
    let (_, scale) = value.as_bigint_and_exponent();
    if scale.abs() > MAX_INPUT_EXPONENT {
        return Err(PrecisionError::InvalidFormat(raw.to_string()));
    }
    if value <= BigDecimal::zero() {
        return Err(PrecisionError::NonPositive(raw.to_string()));
    }
    Ok(value)
}

/// Render with exactly `scale` fractional digits, half-even rounding.
///
/// Never switches to exponent notation: downstream consumers read these
/// columns as plain decimals.
pub fn format_fixed(value: &BigDecimal, scale: u32) -> String {
    let scale = scale as i64;
    let rounded = value.with_scale_round(scale, RoundingMode::HalfEven);
    let (digits, exponent) = rounded.as_bigint_and_exponent();

    let mut magnitude = digits.magnitude().to_string();
    let mut frac_len = exponent;
    if frac_len < 0 {
        magnitude.push_str(&"0".repeat((-frac_len) as usize));
        frac_len = 0;
    }
    let frac_len = frac_len as usize;
    if magnitude.len() <= frac_len {
        magnitude = format!("{:0>width$}", magnitude, width = frac_len + 1);
    }

    let (int_part, frac_part) = magnitude.split_at(magnitude.len() - frac_len);
    let mut out = String::with_capacity(magnitude.len() + 2);
    if digits.sign() == Sign::Minus {
        out.push('-');
    }
    out.push_str(int_part);
    if frac_len > 0 {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

// ============================================================================
// Unit Tests
// ============================================================================
