//! Summary statistics shared by the detectors and analyzers.

use statrs::statistics::Statistics;

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().mean()
    }
}

/// Population standard deviation; 0 for fewer than two values.
pub fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        values.iter().population_std_dev().max(0.0)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `$1,234.56`-style currency text. Negative values keep the sign after `$`.
pub fn money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("${sign}{grouped}.{frac:02}")
}
