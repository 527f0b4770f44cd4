//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i32>(clamped).unwrap_or(0)
}

/// Floor a f64 and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn floor_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i32>(clamped).unwrap_or(0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Rounded percentage of `current` over `max`, clamped to `0..=100`.
///
/// Negative `current` counts as zero and `max` is floored at one.
#[must_use]
pub fn percent_of(current: i64, max: i64) -> i32 {
    let max = max.max(1);
    let ratio = i64_to_f64(current.max(0)) / i64_to_f64(max);
    round_f64_to_i32(ratio * 100.0).clamp(0, 100)
}

/// Scale a percentage threshold by `factor`, flooring the result.
#[must_use]
pub fn scale_floor(value: i32, factor: f64) -> i32 {
    floor_f64_to_i32(f64::from(value) * factor)
}

/// Clamp a percentage to `0..=100`.
#[must_use]
pub const fn clamp_pct(value: i32) -> i32 {
    if value < 0 {
        0
    } else if value > 100 {
        100
    } else {
        value
    }
}
