//! Conversion between decimal amounts typed by the player and the integer
//! smallest units the chain works with.

use color_eyre::eyre::{
    Result,
    eyre,
};

/// Largest number of decimals a `u128` scale factor can represent.
pub const MAX_DECIMALS: u32 = 38;

/// Decimals of the Fuel base asset.
pub const DEFAULT_DECIMALS: u32 = 9;

fn scale(decimals: u32) -> Result<u128> {
    10u128
        .checked_pow(decimals)
        .ok_or_else(|| eyre!("unsupported number of decimals: {decimals}"))
}

/// Parses a decimal string such as `"1.25"` into smallest units.
pub fn parse_units(input: &str, decimals: u32) -> Result<u64> {
    let trimmed = input.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(eyre!("invalid amount '{input}'"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(eyre!("invalid amount '{input}'"));
    }
    // trailing zeros past the precision change nothing
    let fraction = match fraction.split_at_checked(decimals as usize) {
        Some((kept, excess)) if excess.bytes().all(|b| b == b'0') => kept,
        Some(_) => {
            return Err(eyre!(
                "amount '{input}' has more than {decimals} decimal places"
            ));
        }
        None => fraction,
    };

    let unit = scale(decimals)?;
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| eyre!("amount '{input}' is too large"))?
    };
    let fraction_value = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| eyre!("invalid amount '{input}'"))?
    };

    let total = whole_value
        .checked_mul(unit)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| eyre!("amount '{input}' is too large"))?;
    u64::try_from(total).map_err(|_| eyre!("amount '{input}' is too large"))
}

/// Formats smallest units as a decimal string, keeping at least one
/// fractional digit (`1_000_000_000` with 9 decimals is `"1.0"`).
pub fn format_units(raw: u64, decimals: u32) -> String {
    let Ok(unit) = scale(decimals) else {
        return raw.to_string();
    };
    let raw = u128::from(raw);
    let whole = raw / unit;
    let fraction = raw % unit;
    if decimals == 0 || fraction == 0 {
        return format!("{whole}.0");
    }
    let digits = format!("{fraction:0>width$}", width = decimals as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
