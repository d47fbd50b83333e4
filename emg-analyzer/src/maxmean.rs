// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The sliding-window maximum-of-the-moving-mean engine.

use emg_collector::{
    config::EmgConfig,
    dataset::Recording,
    numeric::{sliding_max_mean, unscale},
};

use crate::error::AnalyzerError;

/// One channel's best window: 1-based column index, the window's start/end
/// time, and its maximum mean.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MaxMeanResult {
    pub column_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub max_mean: f64,
}

impl MaxMeanResult {
    /// Divides the scaled time and mean fields back down by
    /// `10^scaling_factor`, the reverse of the scaling `numeric::parse_scaled`
    /// applied at parse time. Callers apply this once, right before a result
    /// is rendered or serialized for an external consumer.
    pub fn descaled(&self, scaling_factor: i32) -> Self {
        MaxMeanResult {
            column_index: self.column_index,
            start_time: unscale(self.start_time, scaling_factor),
            end_time: unscale(self.end_time, scaling_factor),
            max_mean: unscale(self.max_mean, scaling_factor),
        }
    }
}

/// Computes, for every channel, the window of `window_size` consecutive
/// rows with the largest mean. Ordered by channel index ascending.
pub fn compute_max_mean(
    recording: &Recording,
    window_size: usize,
    cfg: &EmgConfig,
) -> Result<Vec<MaxMeanResult>, AnalyzerError> {
    cfg.validate()?;
    if recording.is_empty() {
        return Err(AnalyzerError::validation("recording has no rows"));
    }
    if window_size == 0 {
        return Err(AnalyzerError::validation("window size must be at least 1"));
    }
    if window_size > recording.len() {
        return Err(AnalyzerError::validation(format!(
            "window size {window_size} exceeds {} available rows",
            recording.len()
        ))
        .context("window_size", window_size)
        .context("row_count", recording.len()));
    }

    let times = recording.times();
    let mut results = Vec::with_capacity(recording.channel_count());

    for c in 1..=recording.channel_count() {
        let series = recording.channel_series(c);
        let (start, max_mean) = sliding_max_mean(&series, window_size)
            .expect("window_size already validated against row count");

        results.push(MaxMeanResult {
            column_index: c,
            start_time: times[start],
            end_time: times[start + window_size - 1],
            max_mean,
        });
    }

    Ok(results)
}

/// As [`compute_max_mean`], restricted to rows whose time lies in `[t0,
/// t1]`. Fails with `InsufficientData` if fewer than `window_size` rows
/// survive the restriction.
pub fn compute_max_mean_in_range(
    recording: &Recording,
    window_size: usize,
    t0: f64,
    t1: f64,
    cfg: &EmgConfig,
) -> Result<Vec<MaxMeanResult>, AnalyzerError> {
    cfg.validate()?;
    let rows = recording.rows();
    let start_idx = rows.iter().position(|r| r.time >= t0);
    let end_idx = rows.iter().rposition(|r| r.time <= t1);

    let (start_idx, end_idx) = match (start_idx, end_idx) {
        (Some(s), Some(e)) if s <= e => (s, e),
        _ => {
            return Err(AnalyzerError::insufficient_data(format!(
                "no rows fall within the range [{t0}, {t1}]"
            )))
        }
    };

    let selected_rows = &rows[start_idx..=end_idx];
    if selected_rows.len() < window_size {
        return Err(AnalyzerError::insufficient_data(format!(
            "only {} rows fall within [{t0}, {t1}], need at least {window_size}",
            selected_rows.len()
        ))
        .context("available_rows", selected_rows.len())
        .context("window_size", window_size));
    }

    let sub_times: Vec<f64> = selected_rows.iter().map(|r| r.time).collect();
    let mut results = Vec::with_capacity(recording.channel_count());

    for c in 1..=recording.channel_count() {
        let series: Vec<f64> = selected_rows.iter().map(|r| r.channels[c - 1]).collect();
        let (start, max_mean) = sliding_max_mean(&series, window_size)
            .expect("window_size already validated against selected row count");

        results.push(MaxMeanResult {
            column_index: c,
            start_time: sub_times[start],
            end_time: sub_times[start + window_size - 1],
            max_mean,
        });
    }

    Ok(results)
}
