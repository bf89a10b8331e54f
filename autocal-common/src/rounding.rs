//! Decimal rounding helpers
//!
//! Firmware reports and accepts values with a handful of decimals, so the
//! calibration math rounds intermediate results to a fixed number of places.

/// Round `value` to `places` decimal places
///
/// Rounds the exact binary value of `value`, the way fixed-precision
/// formatting does. A mean like `(1.0 + 1.001) / 2` is stored slightly below
/// 1.0005 and therefore rounds down to 1.0.
pub fn round_to(value: f64, places: u32) -> f64 {
    format!("{:.*}", places as usize, value)
        .parse()
        .unwrap_or(value)
}
