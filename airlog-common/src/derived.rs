//! Metrics derived from averaged sensor values.

/// Convert degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

// Rothfusz regression coefficients (NWS technical attachment SR 90-23).
const C1: f64 = -42.379;
const C2: f64 = 2.049_015_23;
const C3: f64 = 10.143_331_27;
const C4: f64 = -0.224_755_41;
const C5: f64 = -0.006_837_83;
const C6: f64 = -0.054_817_17;
const C7: f64 = 0.001_228_74;
const C8: f64 = 0.000_852_82;
const C9: f64 = -0.000_001_99;

/// Heat index in Fahrenheit for a temperature (F) and relative humidity (%).
///
/// Follows the National Weather Service procedure: Steadman's simple formula
/// is computed first, and the full Rothfusz regression (with its low and high
/// humidity adjustments) is only used when the average of that result and the
/// air temperature reaches 80 F.
pub fn heat_index_f(temperature_f: f64, humidity_pct: f64) -> f64 {
    let t = temperature_f;
    let rh = humidity_pct;

    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    if (simple + t) / 2.0 < 80.0 {
        return simple;
    }

    let mut hi = C1
        + C2 * t
        + C3 * rh
        + C4 * t * rh
        + C5 * t * t
        + C6 * rh * rh
        + C7 * t * t * rh
        + C8 * t * rh * rh
        + C9 * t * t * rh * rh;

    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    hi
}
