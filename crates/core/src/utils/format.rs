//! Display formatting for amounts, USD values and addresses.

use num_bigint::BigUint;
use num_traits::Zero;

/// Render a base-unit integer as a decimal string with `decimals` places.
///
/// Trailing fractional zeros are dropped, as is a trailing dot:
/// `1500000` with 6 decimals is `"1.5"`, `1000000` is `"1"`.
pub fn format_units(value: &BigUint, decimals: u8) -> String {
    let digits = value.to_str_radix(10);
    if decimals == 0 || value.is_zero() {
        return digits;
    }

    let decimals = decimals as usize;
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// `1234.5` -> `"$1,234.50"`
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(integer), fraction)
}

/// Short human form of a token amount given as a decimal string.
///
/// Zero is `"0"`, dust below 0.0001 is `"<0.0001"`, amounts below one get
/// four decimals and everything else two.
pub fn format_amount(value: &str) -> String {
    let num = match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => return "0".to_string(),
    };
    if num == 0.0 {
        return "0".to_string();
    }
    if num < 0.0001 {
        return "<0.0001".to_string();
    }
    if num < 1.0 {
        format!("{:.4}", num)
    } else {
        format!("{:.2}", num)
    }
}

/// `0x1234567890abcdef1234567890abcdef12345678` -> `0x1234...5678`
pub fn abbreviate_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = address.chars().collect();
    let head: String = chars.iter().take(6).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

fn group_thousands(integer: &str) -> String {
    let mut out = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
