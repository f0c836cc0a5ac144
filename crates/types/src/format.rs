//! Human-readable byte sizes and transfer rates

/// Render a byte count with base-1024 units and two decimals
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Parse a transfer rate such as `500m`, `200k` or `1048576` into bytes per second.
///
/// Suffixes follow wget: `k` is 1024, `m` is 1024², `g` is 1024³.
/// Returns `None` for an empty or malformed string. A rate of `0` means unlimited.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_rate(rate: &str) -> Option<u64> {
    let rate = rate.trim();
    let (number, multiplier) = match rate.chars().last()?.to_ascii_lowercase() {
        'k' => (&rate[..rate.len() - 1], 1024u64),
        'm' => (&rate[..rate.len() - 1], 1024 * 1024),
        'g' => (&rate[..rate.len() - 1], 1024 * 1024 * 1024),
        c if c.is_ascii_digit() || c == '.' => (rate, 1),
        _ => return None,
    };
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier as f64) as u64)
}
