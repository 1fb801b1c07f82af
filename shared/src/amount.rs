//! Decimal amount <-> base unit conversion.
//!
//! Amounts arrive as user-typed decimal strings ("1.5", "0.25") and leave as
//! exact integers in the chain's smallest unit. Conversion fails closed: any
//! input that is not a plain, positive decimal is rejected before it can reach
//! a transaction. Digits are scaled straight into `U256`, so the only size
//! ceiling is the 256-bit range.

use ethers::types::U256;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decimals of the chain's native currency (POL / ETH).
pub const NATIVE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("'{0}' is not a plain decimal number")]
    Malformed(String),
    #[error("at most {max} decimal places are allowed, got {got}")]
    TooPrecise { max: u32, got: u32 },
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount is too large")]
    Overflow,
}

/// A validated `digits[.digits]` amount, normalized: no leading zeros in the
/// whole part, no trailing zeros in the fraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainDecimal {
    whole: String,
    fraction: String,
}

impl PlainDecimal {
    /// Number of significant fractional digits
    pub fn scale(&self) -> u32 {
        u32::try_from(self.fraction.len()).unwrap_or(u32::MAX)
    }

    pub fn is_zero(&self) -> bool {
        self.whole == "0" && self.fraction.is_empty()
    }
}

impl FromStr for PlainDecimal {
    type Err = AmountError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative);
        }

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        let well_formed = !(whole.is_empty() && fraction.is_empty())
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }

        let whole = whole.trim_start_matches('0');
        Ok(Self {
            whole: if whole.is_empty() { "0" } else { whole }.to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }
}

impl fmt::Display for PlainDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction.is_empty() {
            write!(f, "{}", self.whole)
        } else {
            write!(f, "{}.{}", self.whole, self.fraction)
        }
    }
}

/// Parse a plain decimal string (`digits[.digits]`) into its normalized form.
pub fn parse_decimal(input: &str) -> Result<PlainDecimal, AmountError> {
    input.parse()
}

/// Convert a decimal string to base units with the given number of decimals.
pub fn parse_units(input: &str, decimals: u32) -> Result<U256, AmountError> {
    let amount = parse_decimal(input)?;
    to_base_units(&amount, decimals)
}

/// Convert a decimal string of native currency to wei-style base units.
pub fn parse_ether(input: &str) -> Result<U256, AmountError> {
    parse_units(input, NATIVE_DECIMALS)
}

/// Scale an already-parsed amount to base units.
pub fn to_base_units(amount: &PlainDecimal, decimals: u32) -> Result<U256, AmountError> {
    let scale = amount.scale();
    if scale > decimals {
        return Err(AmountError::TooPrecise {
            max: decimals,
            got: scale,
        });
    }
    if amount.is_zero() {
        return Err(AmountError::NotPositive);
    }

    let digits = format!("{}{}", amount.whole, amount.fraction);
    let mantissa = U256::from_dec_str(&digits).map_err(|_| AmountError::Overflow)?;
    let multiplier = U256::from(10u8)
        .checked_pow(U256::from(decimals - scale))
        .ok_or(AmountError::Overflow)?;

    mantissa.checked_mul(multiplier).ok_or(AmountError::Overflow)
}

/// Render base units as a decimal string, trimming trailing zeros but always
/// keeping one fractional digit (`1.5`, `2.0`, `0.000001`).
pub fn format_units(value: U256, decimals: u32) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    let (whole, fraction) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}

pub fn format_ether(value: U256) -> String {
    format_units(value, NATIVE_DECIMALS)
}
