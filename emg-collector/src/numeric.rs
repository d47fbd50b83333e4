// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Scaled-integer conversion and windowed mean/max primitives. Pure
//! functions, no I/O, no allocation beyond the caller's own buffers.

use crate::error::CollectorError;

/// Parses a decimal string and scales it by `10^k`.
///
/// `k` is the core-wide scaling factor (see [`crate::config::EmgConfig`]);
/// it is fixed for the duration of a run.
pub fn parse_scaled(s: &str, k: i32) -> Result<f64, CollectorError> {
    let trimmed = s.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| CollectorError::parse("scaled value", format!("not a finite number: {trimmed:?}")))?;

    if !value.is_finite() {
        return Err(CollectorError::parse(
            "scaled value",
            format!("not a finite number: {trimmed:?}"),
        ));
    }

    Ok(value * 10f64.powi(k))
}

/// The inverse of [`parse_scaled`]: divides a value carried in the core's
/// scaled representation back down to real units before it is reported
/// externally (rendered as CSV, or serialized as JSON).
pub fn unscale(value: f64, k: i32) -> f64 {
    value / 10f64.powi(k)
}

/// Arithmetic mean of `xs[i..i+w)`. Panics (a programmer error, not a
/// recoverable condition) if `i + w > xs.len()`.
pub fn window_mean(xs: &[f64], i: usize, w: usize) -> f64 {
    assert!(i + w <= xs.len(), "window [{i}, {}) out of bounds ({})", i + w, xs.len());
    xs[i..i + w].iter().sum::<f64>() / w as f64
}

/// For every window of size `w`, the maximum arithmetic mean, found with an
/// O(N) incremental running sum. Ties keep the first (smallest-index)
/// window. Returns `None` if `w == 0`, `w > xs.len()`, or `xs` is empty.
pub fn sliding_max_mean(xs: &[f64], w: usize) -> Option<(usize, f64)> {
    if w == 0 || w > xs.len() {
        return None;
    }

    let mut sum: f64 = xs[..w].iter().sum();
    let mut best_start = 0;
    let mut best_sum = sum;

    for i in 1..=(xs.len() - w) {
        sum = sum - xs[i - 1] + xs[i + w - 1];
        if sum > best_sum {
            best_sum = sum;
            best_start = i;
        }
    }

    Some((best_start, best_sum / w as f64))
}

/// Argmax over `xs`. Ties keep the first occurrence. Returns `None` for an
/// empty slice.
pub fn max_index(xs: &[f64]) -> Option<usize> {
    xs.iter()
        .enumerate()
        .fold(None, |best, (i, &x)| match best {
            Some((_, bx)) if bx >= x => best,
            _ => Some((i, x)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("10", 0, 10.0)]
    #[test_case("1.5", 1, 15.0)]
    #[test_case("1.5", 2, 150.0)]
    #[test_case("-3.2", 1, -32.0)]
    fn parse_scaled_scales_by_power_of_ten(input: &str, k: i32, expected: f64) {
        assert!((parse_scaled(input, k).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn parse_scaled_rejects_non_numeric() {
        assert!(parse_scaled("abc", 0).is_err());
    }

    #[test_case("10", 0, 10.0)]
    #[test_case("1.5", 1, 15.0)]
    #[test_case("1.5", 2, 150.0)]
    #[test_case("-3.2", 1, -32.0)]
    fn unscale_undoes_parse_scaled(input: &str, k: i32, expected_scaled: f64) {
        let scaled = parse_scaled(input, k).unwrap();
        assert_eq!(scaled, expected_scaled);
        let original: f64 = input.parse().unwrap();
        assert!((unscale(scaled, k) - original).abs() < 1e-9);
    }

    #[test]
    fn window_mean_matches_direct_computation() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(window_mean(&xs, 1, 2), 2.5);
    }

    #[test]
    fn sliding_max_mean_scenario_1() {
        // time,ch1: (1,100) (2,200) (3,150) (4,300), window=2
        let xs = [100.0, 200.0, 150.0, 300.0];
        let (start, mean) = sliding_max_mean(&xs, 2).unwrap();
        assert_eq!(start, 2);
        assert_eq!(mean, 225.0);
    }

    #[test]
    fn sliding_max_mean_ties_keep_first_occurrence() {
        let xs = [100.0, 100.0, 100.0];
        let (start, mean) = sliding_max_mean(&xs, 2).unwrap();
        assert_eq!(start, 0);
        assert_eq!(mean, 100.0);
    }

    #[test]
    fn sliding_max_mean_window_one_equals_global_max() {
        let xs = [10.0, 40.0, 20.0, 5.0];
        let (start, mean) = sliding_max_mean(&xs, 1).unwrap();
        assert_eq!(start, 1);
        assert_eq!(mean, 40.0);
        assert_eq!(max_index(&xs), Some(1));
    }

    #[test]
    fn sliding_max_mean_incremental_matches_naive() {
        let xs = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        for w in 1..=xs.len() {
            let (inc_start, inc_mean) = sliding_max_mean(&xs, w).unwrap();

            let (naive_start, naive_mean) = (0..=xs.len() - w)
                .map(|i| (i, window_mean(&xs, i, w)))
                .fold((0usize, f64::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 { cur } else { best }
                });

            assert_eq!(inc_start, naive_start);
            assert!((inc_mean - naive_mean).abs() < 1e-9);
        }
    }

    #[test]
    fn sliding_max_mean_rejects_window_larger_than_input() {
        assert_eq!(sliding_max_mean(&[1.0, 2.0], 3), None);
    }

    #[test]
    fn max_index_empty_is_none() {
        assert_eq!(max_index(&[]), None);
    }
}
