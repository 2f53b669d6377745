use std::time::Duration;

use alloy_primitives::U256;
use rand::Rng;
use serde_json::Value;

pub const WEI_DECIMALS: usize = 18;

/// Convert a decimal ether amount ("1.5", "0.000001", "2e-7") to wei.
/// Digits beyond 18 decimals are truncated.
pub fn parse_ether_value(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.contains(['e', 'E']) {
        let value: f64 = raw.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        return parse_ether_value(&format!("{:.18}", value));
    }

    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut frac: String = frac_part.chars().take(WEI_DECIMALS).collect();
    while frac.len() < WEI_DECIMALS {
        frac.push('0');
    }

    let digits = format!("{}{}", int_part, frac);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).ok()
}

/// Parse a wei amount given as an integer JSON number, a decimal string or a
/// `0x` hex string.
pub fn parse_wei_value(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some("") => Some(U256::ZERO),
                Some(hex) => U256::from_str_radix(hex, 16).ok(),
                None if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => U256::from_str_radix(s, 10).ok(),
                None => None,
            }
        },
        _ => None,
    }
}

pub fn parse_u64_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        },
        _ => None,
    }
}

/// Lossy conversion used only for ratios; exact amounts stay in U256.
pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::MAX)
}

/// Calculate exponential backoff with jitter
pub fn calculate_backoff_with_jitter(
    attempt: usize,
    base_delay_ms: u64,
    max_delay_ms: u64,
) -> Duration {
    // Exponential backoff: delay = base * 2^attempt
    let exponential_delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt as u32));

    let capped_delay = exponential_delay.min(max_delay_ms);

    // Add jitter (±25% of the delay)
    let mut rng = rand::rng();
    let jitter_range = (capped_delay as f64 * 0.25) as u64;
    let jitter = rng.random_range(0..=jitter_range * 2);
    let final_delay = capped_delay.saturating_add(jitter).saturating_sub(jitter_range);

    Duration::from_millis(final_delay)
}

/// Check if an error message indicates a rate limit or timeout that should be retried
pub fn is_retryable_error(error_msg: &str) -> bool {
    error_msg.contains("429") // Rate limit
        || error_msg.contains("timed out")
        || error_msg.contains("timeout")
        || error_msg.contains("connection reset")
        || error_msg.contains("connection refused")
        || error_msg.contains("Too Many Requests")
}
