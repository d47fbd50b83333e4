// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Per-phase summary statistics over one recording, given a
//! set of phase labels and the time boundaries that partition them.

use emg_collector::{config::EmgConfig, dataset::Recording, numeric::unscale};

use crate::error::AnalyzerError;

/// One phase's per-channel max/mean over its time interval.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub max_by_channel: Vec<f64>,
    pub mean_by_channel: Vec<f64>,
}

impl PhaseResult {
    /// Divides every scaled field back down by `10^scaling_factor`.
    pub fn descaled(&self, scaling_factor: i32) -> Self {
        PhaseResult {
            phase_name: self.phase_name.clone(),
            start_time: unscale(self.start_time, scaling_factor),
            end_time: unscale(self.end_time, scaling_factor),
            max_by_channel: self.max_by_channel.iter().map(|&v| unscale(v, scaling_factor)).collect(),
            mean_by_channel: self.mean_by_channel.iter().map(|&v| unscale(v, scaling_factor)).collect(),
        }
    }
}

/// The full per-phase breakdown plus the row index of the global
/// per-channel maximum across all phases.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PhaseAnalysisResult {
    pub phases: Vec<PhaseResult>,
    pub max_time_index: usize,
}

impl PhaseAnalysisResult {
    /// Divides every phase's scaled fields back down by `10^scaling_factor`.
    /// `max_time_index` is a row index, not a scaled value, and is unchanged.
    pub fn descaled(&self, scaling_factor: i32) -> Self {
        PhaseAnalysisResult {
            phases: self.phases.iter().map(|p| p.descaled(scaling_factor)).collect(),
            max_time_index: self.max_time_index,
        }
    }
}

/// Partitions `recording` into `labels.len()` phases using `boundaries`
/// (`labels.len() + 1` monotonically non-decreasing time points). Every
/// phase but the last is the half-open interval `[boundaries[k],
/// boundaries[k+1])`; the last is closed on the right.
pub fn analyse_phases(
    recording: &Recording,
    labels: &[String],
    boundaries: &[f64],
    cfg: &EmgConfig,
) -> Result<PhaseAnalysisResult, AnalyzerError> {
    cfg.validate()?;
    if recording.is_empty() {
        return Err(AnalyzerError::validation("recording has no rows"));
    }

    let phase_count = labels.len();
    if boundaries.len() != phase_count + 1 {
        return Err(AnalyzerError::validation(format!(
            "{} phase labels need {} boundaries, got {}",
            phase_count,
            phase_count + 1,
            boundaries.len()
        )));
    }

    if !boundaries.windows(2).all(|w| w[0] <= w[1]) {
        return Err(AnalyzerError::validation("phase boundaries are not monotonically non-decreasing"));
    }

    let channel_count = recording.channel_count();
    let rows = recording.rows();

    let mut phases = Vec::with_capacity(phase_count);
    let mut global_max = f64::NEG_INFINITY;
    let mut global_max_index = None;

    for (k, label) in labels.iter().enumerate() {
        let lo = boundaries[k];
        let hi = boundaries[k + 1];
        let is_last_phase = k == phase_count - 1;

        let indices: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.time >= lo && if is_last_phase { r.time <= hi } else { r.time < hi })
            .map(|(i, _)| i)
            .collect();

        if indices.is_empty() {
            return Err(AnalyzerError::validation(format!(
                "phase {label:?} has no rows in its interval"
            ))
            .context("phase", label.clone())
            .context("start_time", lo)
            .context("end_time", hi));
        }

        let mut max_by_channel = vec![f64::NEG_INFINITY; channel_count];
        let mut sum_by_channel = vec![0.0; channel_count];

        for &i in &indices {
            for c in 0..channel_count {
                let v = rows[i].channels[c];
                sum_by_channel[c] += v;
                if v > max_by_channel[c] {
                    max_by_channel[c] = v;
                }
                if v > global_max {
                    global_max = v;
                    global_max_index = Some(i);
                }
            }
        }

        let mean_by_channel: Vec<f64> = sum_by_channel.iter().map(|s| s / indices.len() as f64).collect();

        phases.push(PhaseResult {
            phase_name: label.clone(),
            start_time: lo,
            end_time: hi,
            max_by_channel,
            mean_by_channel,
        });
    }

    Ok(PhaseAnalysisResult {
        phases,
        max_time_index: global_max_index.expect("at least one phase has at least one row"),
    })
}
