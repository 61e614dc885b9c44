//! Parsers for user-supplied CPU and memory asks.
//!
//! The two parsers follow different failure policies. A CPU ask that cannot
//! be read is an error; a memory ask that cannot be read is zero.

use crate::{QuantityError, Result};

/// One byte.
pub const BYTE: u64 = 1;
/// 1024 bytes.
pub const KILOBYTE: u64 = BYTE << 10;
/// 1024 kilobytes.
pub const MEGABYTE: u64 = KILOBYTE << 10;
/// 1024 megabytes.
pub const GIGABYTE: u64 = MEGABYTE << 10;
/// 1024 gigabytes.
pub const TERABYTE: u64 = GIGABYTE << 10;

const MILLICORES_PER_CORE: u64 = 1000;

/// Parse a CPU ask into millicores.
///
/// A bare integer is a whole number of cores (`"2"` is 2000 millicores). A
/// string with a unit character keeps only its leading digit run, which is
/// read as millicores (`"500m"` is 500). Fractional cores are not accepted.
///
/// # Errors
///
/// Returns [`QuantityError::InvalidCpu`] when the numeric segment is missing
/// or malformed, [`QuantityError::ZeroCpu`] when it is zero and
/// [`QuantityError::Overflow`] when the core count does not fit in millicores.
pub fn parse_cpu(input: &str) -> Result<u64> {
    let input = input.trim();

    match input.find(char::is_alphabetic) {
        None => {
            let cores: u64 = input
                .parse()
                .map_err(|_| QuantityError::InvalidCpu(input.to_string()))?;
            let millicores = cores
                .checked_mul(MILLICORES_PER_CORE)
                .ok_or_else(|| QuantityError::Overflow(input.to_string()))?;
            non_zero(millicores, input)
        }
        Some(boundary) => {
            let digits = &input[..boundary];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(QuantityError::InvalidCpu(input.to_string()));
            }
            let millicores: u64 = digits
                .parse()
                .map_err(|_| QuantityError::Overflow(input.to_string()))?;
            non_zero(millicores, input)
        }
    }
}

fn non_zero(millicores: u64, input: &str) -> Result<u64> {
    if millicores == 0 {
        Err(QuantityError::ZeroCpu(input.to_string()))
    } else {
        Ok(millicores)
    }
}

/// Parse a memory ask into bytes.
///
/// The input is trimmed and upper-cased; the first alphabetic character
/// splits a floating-point amount from its unit. `B`, `K`, `M`, `G` and `T`
/// are accepted alone or with a `B`, `I` or `IB` tail, and every form uses
/// the 1024-based scale (`"1G"`, `"1GB"` and `"1Gi"` are all 2^30 bytes).
///
/// Anything unreadable yields zero: a missing unit, an unknown unit, or an
/// amount that is malformed or not positive.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_memory(input: &str) -> u64 {
    let input = input.trim().to_uppercase();

    let Some(boundary) = input.find(char::is_alphabetic) else {
        return 0;
    };
    let (amount, unit) = input.split_at(boundary);

    let amount: f64 = match amount.parse() {
        Ok(amount) if amount > 0.0 => amount,
        _ => return 0,
    };

    let scale = match unit {
        "T" | "TB" | "TIB" | "TI" => TERABYTE,
        "G" | "GB" | "GIB" | "GI" => GIGABYTE,
        "M" | "MB" | "MIB" | "MI" => MEGABYTE,
        "K" | "KB" | "KIB" | "KI" => KILOBYTE,
        "B" => BYTE,
        _ => return 0,
    };

    (amount * scale as f64) as u64
}
