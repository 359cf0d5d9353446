//! Human amounts <-> on-chain base units.
//!
//! Conversions are decimal-exact: the human string is never routed through a
//! float. An amount with more fractional digits than the asset supports is an
//! error rather than being rounded.

use alloy::primitives::{
    utils::{format_units, parse_units},
    Address, U256,
};
use std::str::FromStr;

use crate::models::DispatchError;

pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, DispatchError> {
    let normalized = normalize_decimal(amount)?;

    if let Some((_, fraction)) = normalized.split_once('.') {
        if fraction.len() > decimals as usize {
            return Err(DispatchError::InvalidAmount(format!(
                "'{}' has more than {} decimal places",
                amount.trim(),
                decimals
            )));
        }
    }

    let parsed = parse_units(&normalized, decimals)
        .map_err(|e| DispatchError::InvalidAmount(format!("'{}': {}", amount.trim(), e)))?;
    Ok(parsed.get_absolute())
}

/// Like [`to_base_units`] but additionally rejects zero.
pub fn parse_positive_amount(amount: &str, decimals: u8) -> Result<U256, DispatchError> {
    let units = to_base_units(amount, decimals)?;
    if units.is_zero() {
        return Err(DispatchError::InvalidAmount("Amount must be greater than zero.".to_string()));
    }
    Ok(units)
}

/// Renders base units as a trimmed decimal string (`1000000`, 6 -> `"1"`).
pub fn from_base_units(units: U256, decimals: u8) -> Result<String, DispatchError> {
    let rendered = format_units(units, decimals)
        .map_err(|e| DispatchError::InvalidAmount(format!("cannot render {} with {} decimals: {}", units, decimals, e)))?;

    if !rendered.contains('.') {
        return Ok(rendered);
    }
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    Ok(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}

/// Lenient conversion: exact parsing first, and if that fails, the integer
/// part of the input taken as-is *without* scaling by `decimals`.
///
/// This reproduces a known precision hazard of the dashboard's older helper
/// and is only for callers that opt into it explicitly. It is not used by the
/// tool runner.
pub fn to_base_units_lenient(amount: &str, decimals: u8) -> Result<U256, DispatchError> {
    match to_base_units(amount, decimals) {
        Ok(units) => Ok(units),
        Err(exact_error) => {
            let integer_part = amount.trim().split('.').next().unwrap_or_default();
            U256::from_str(integer_part).map_err(|_| exact_error)
        }
    }
}

pub fn parse_address(raw: &str) -> Result<Address, DispatchError> {
    Address::from_str(raw.trim()).map_err(|e| DispatchError::InvalidAddress(format!("'{}': {}", raw.trim(), e)))
}

const MAX_EXPONENT: u32 = 100;

/// Accepts `12`, `12.5`, `.5`, `5.` and scientific notation (`1e-6`, `2.5E3`),
/// which is how JSON serializers print small and large floats. Rejects signs
/// and junk. The result is plain positional notation.
fn normalize_decimal(amount: &str) -> Result<String, DispatchError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(DispatchError::InvalidAmount("enter a numeric value".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(DispatchError::InvalidAmount(format!("'{}' is negative", trimmed)));
    }
    let not_decimal = || DispatchError::InvalidAmount(format!("'{}' is not a decimal number", trimmed));

    let (mantissa, exponent) = match trimmed.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (&trimmed[..at], Some(&trimmed[at + 1..])),
        None => (trimmed, None),
    };

    let (integer, fraction) = match mantissa.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (mantissa, None),
    };

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let fraction_ok = fraction.map_or(true, digits_only);
    let has_digits = !integer.is_empty() || fraction.map_or(false, |f| !f.is_empty());
    if !digits_only(integer) || !fraction_ok || !has_digits {
        return Err(not_decimal());
    }

    let integer = if integer.is_empty() { "0" } else { integer };
    let fraction = fraction.unwrap_or_default();

    let Some(exponent) = exponent else {
        return Ok(if fraction.is_empty() {
            integer.to_string()
        } else {
            format!("{}.{}", integer, fraction)
        });
    };

    let exponent: i64 = exponent.parse().map_err(|_| not_decimal())?;
    if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
        return Err(DispatchError::InvalidAmount(format!("'{}' is out of range", trimmed)));
    }
    Ok(shift_point(integer, fraction, exponent))
}

/// Moves the decimal point of `integer.fraction` by `exponent` places.
fn shift_point(integer: &str, fraction: &str, exponent: i64) -> String {
    let digits = format!("{}{}", integer, fraction);
    let point = integer.len() as i64 + exponent;

    let (whole, fraction) = if point <= 0 {
        (String::new(), format!("{}{}", "0".repeat(point.unsigned_abs() as usize), digits))
    } else if point as usize >= digits.len() {
        (format!("{}{}", digits, "0".repeat(point as usize - digits.len())), String::new())
    } else {
        let (whole, fraction) = digits.split_at(point as usize);
        (whole.to_string(), fraction.to_string())
    };

    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    match fraction.trim_end_matches('0') {
        "" => whole.to_string(),
        fraction => format!("{}.{}", whole, fraction),
    }
}
