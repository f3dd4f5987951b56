//! Display formatting for countdowns and token amounts.

use crate::tiers::SECONDS_PER_DAY;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_MINUTE: i64 = 60;

pub const UNLOCKED: &str = "Unlocked";
pub const LESS_THAN_A_MINUTE: &str = "Less than 1 minute";

/// Renders time left until unlock as `"2d 5h 30m"`.
///
/// Zero-valued units are dropped. Non-positive input is `"Unlocked"`, and a
/// positive remainder under a minute is `"Less than 1 minute"`, so the result
/// is never empty.
pub fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return UNLOCKED.to_string();
    }

    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;

    let parts: Vec<String> = [(days, 'd'), (hours, 'h'), (minutes, 'm')]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if parts.is_empty() {
        LESS_THAN_A_MINUTE.to_string()
    } else {
        parts.join(" ")
    }
}

/// Renders a smallest-unit amount with `decimals` fractional digits,
/// trimming trailing zeros: `1_500_000_000` at 9 decimals is `"1.5"`.
///
/// Works on the decimal digits, so any `decimals` value is placed exactly;
/// beyond the width of `u128` the whole part is simply `0`.
pub fn format_amount(raw: u128, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    let digits = format!("{:0>width$}", raw, width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Parses a decimal string such as `"12.5"` into smallest units.
///
/// Returns `None` for malformed input, more fractional digits than
/// `decimals`, or values that do not fit in a `u64`.
pub fn parse_amount(input: &str, decimals: u8) -> Option<u64> {
    let input = input.trim();
    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > usize::from(decimals)
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let scale = 10u64.checked_pow(u32::from(decimals))?;
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction_value: u64 = if fraction.is_empty() {
        0
    } else {
        let padding = 10u64.checked_pow((usize::from(decimals) - fraction.len()) as u32)?;
        fraction.parse::<u64>().ok()?.checked_mul(padding)?
    };
    whole.checked_mul(scale)?.checked_add(fraction_value)
}
