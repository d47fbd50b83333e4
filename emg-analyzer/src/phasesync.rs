// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Aligns a motion/force/EMG recording triple named by one
//! phase-manifest row onto a shared EMG-time window, and extracts
//! per-channel summary statistics over it. The hardest subsystem — three
//! sample rates, two marker domains, one conversion rule.

use std::{fs, path::Path};

use emg_collector::{
    anc::parse_anc,
    config::EmgConfig,
    dataset::Recording,
    error::CollectorError,
    manifest::{Marker, MarkerDomain, PhaseManifestEntry},
    numeric::unscale,
    parser::{parse_table, RowPolicy},
};

use crate::error::AnalyzerError;

/// Motion sample interval, 250 Hz.
const DT_MOTION: f64 = 1.0 / 250.0;
/// EMG (and force) sample interval, 1000 Hz.
const DT_EMG: f64 = 1.0 / 1000.0;

/// A manifest entry's three recordings, loaded and validated together.
pub struct MultiRateBundle {
    pub motion: Recording,
    pub force: Recording,
    pub emg: Recording,
    pub manifest: PhaseManifestEntry,
}

fn validate_ascending_finite(label: &str, recording: &Recording) -> Result<(), AnalyzerError> {
    let times = recording.times();
    if times.iter().any(|t| !t.is_finite()) {
        return Err(AnalyzerError::validation(format!(
            "{label} recording has a non-finite time value"
        )));
    }
    if !times.windows(2).all(|w| w[0] < w[1]) {
        return Err(AnalyzerError::validation(format!(
            "{label} recording's time column is not strictly ascending"
        )));
    }
    Ok(())
}

fn read_table(path: &Path, delimiter: char, scaling_factor: i32) -> Result<Recording, AnalyzerError> {
    let text = fs::read_to_string(path).map_err(CollectorError::from)?;
    let (header, rows) = parse_table(&text, delimiter, RowPolicy::Strict, scaling_factor)?;
    Ok(Recording::new(header, rows)?)
}

fn read_anc(path: &Path, scaling_factor: i32) -> Result<Recording, AnalyzerError> {
    let text = fs::read_to_string(path).map_err(CollectorError::from)?;
    let (_, recording) = parse_anc(&text, scaling_factor)?;
    Ok(recording)
}

/// Loads the motion, force, and EMG files named by `entry` (resolved under
/// `dir`) concurrently, one blocking worker per file, then validates each
/// recording's time column is strictly ascending and finite.
pub async fn load_bundle(
    dir: &Path,
    entry: PhaseManifestEntry,
    delimiter: char,
    scaling_factor: i32,
) -> Result<MultiRateBundle, AnalyzerError> {
    let motion_path = dir.join(&entry.motion_file);
    let force_path = dir.join(&entry.force_file);
    let emg_path = dir.join(&entry.emg_file);

    let motion_task = tokio::task::spawn_blocking(move || read_table(&motion_path, delimiter, scaling_factor));
    let force_task = tokio::task::spawn_blocking(move || read_anc(&force_path, scaling_factor));
    let emg_task = tokio::task::spawn_blocking(move || read_table(&emg_path, delimiter, scaling_factor));

    let (motion, force, emg) = tokio::join!(motion_task, force_task, emg_task);

    let motion = motion.map_err(|e| AnalyzerError::Unknown(e.to_string()))??;
    let force = force.map_err(|e| AnalyzerError::Unknown(e.to_string()))??;
    let emg = emg.map_err(|e| AnalyzerError::Unknown(e.to_string()))??;

    validate_ascending_finite("motion", &motion)?;
    validate_ascending_finite("force", &force)?;
    validate_ascending_finite("emg", &emg)?;

    Ok(MultiRateBundle {
        motion,
        force,
        emg,
        manifest: entry,
    })
}

/// Converts one phase marker's raw manifest value into EMG time, following
/// its domain: a force-time marker shifts by the EMG/motion offset; a
/// motion-index marker first converts to force time, then shifts.
fn marker_to_emg_time(marker: Marker, value: f64, emg_motion_offset: i64) -> f64 {
    let force_time = match marker.domain() {
        MarkerDomain::ForceTime => value,
        MarkerDomain::MotionIndex => (value - 1.0) * DT_MOTION,
    };
    force_time + emg_motion_offset as f64 * DT_EMG
}

/// One phase window's statistics: the two markers that bound it, the EMG
/// times they resolved to, and per-channel mean/max over the EMG rows in
/// that window, keyed by channel name.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PhaseSyncResult {
    pub start_marker: String,
    pub end_marker: String,
    pub start_time: f64,
    pub end_time: f64,
    pub channel_names: Vec<String>,
    pub mean_by_channel: Vec<f64>,
    pub max_by_channel: Vec<f64>,
}

impl PhaseSyncResult {
    /// Divides the per-channel mean/max back down by `10^scaling_factor`.
    /// `start_time`/`end_time` are resolved from manifest marker values and
    /// the EMG/motion sample offset, never from scaled channel data, so they
    /// carry no scaling to undo.
    pub fn descaled(&self, scaling_factor: i32) -> Self {
        PhaseSyncResult {
            start_marker: self.start_marker.clone(),
            end_marker: self.end_marker.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            channel_names: self.channel_names.clone(),
            mean_by_channel: self.mean_by_channel.iter().map(|&v| unscale(v, scaling_factor)).collect(),
            max_by_channel: self.max_by_channel.iter().map(|&v| unscale(v, scaling_factor)).collect(),
        }
    }
}

/// Resolves `start_marker`/`end_marker` to EMG time via `bundle.manifest`,
/// selects the EMG rows in `[t_e_start, t_e_end]`, and computes per-channel
/// mean/max over them.
pub fn analyse_phase_sync(
    bundle: &MultiRateBundle,
    start_marker: Marker,
    end_marker: Marker,
    cfg: &EmgConfig,
) -> Result<PhaseSyncResult, AnalyzerError> {
    cfg.validate()?;
    let offset = bundle.manifest.emg_motion_offset;
    let start_value = bundle.manifest.points.get(start_marker);
    let end_value = bundle.manifest.points.get(end_marker);

    let t_e_start = marker_to_emg_time(start_marker, start_value, offset);
    let t_e_end = marker_to_emg_time(end_marker, end_value, offset);

    if !(t_e_start < t_e_end) {
        return Err(AnalyzerError::validation(format!(
            "start EMG time {t_e_start} is not before end EMG time {t_e_end}"
        ))
        .context("start_marker", start_marker)
        .context("end_marker", end_marker));
    }

    let rows = bundle.emg.rows();
    let start_idx = rows.iter().position(|r| r.time >= t_e_start);
    let end_idx = rows.iter().rposition(|r| r.time <= t_e_end);

    let (start_idx, end_idx) = match (start_idx, end_idx) {
        (Some(s), Some(e)) if s <= e => (s, e),
        _ => {
            return Err(AnalyzerError::insufficient_data(format!(
                "no EMG rows fall within [{t_e_start}, {t_e_end}]"
            ))
            .context("start_time", t_e_start)
            .context("end_time", t_e_end))
        }
    };

    let selected = &rows[start_idx..=end_idx];
    let channel_count = bundle.emg.channel_count();
    let mut sum_by_channel = vec![0.0; channel_count];
    let mut max_by_channel = vec![f64::NEG_INFINITY; channel_count];

    for row in selected {
        for c in 0..channel_count {
            let v = row.channels[c];
            sum_by_channel[c] += v;
            if v > max_by_channel[c] {
                max_by_channel[c] = v;
            }
        }
    }

    let mean_by_channel: Vec<f64> = sum_by_channel
        .iter()
        .map(|s| s / selected.len() as f64)
        .collect();
    let channel_names: Vec<String> = (1..=channel_count)
        .map(|c| bundle.emg.channel_name(c).unwrap_or_default().to_string())
        .collect();

    Ok(PhaseSyncResult {
        start_marker: start_marker.to_string(),
        end_marker: end_marker.to_string(),
        start_time: t_e_start,
        end_time: t_e_end,
        channel_names,
        mean_by_channel,
        max_by_channel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_collector::dataset::SampleRow;
    use std::collections::BTreeMap;

    fn emg(times: &[f64], ch1: &[f64]) -> Recording {
        let header = vec!["time".to_string(), "ch1".to_string()];
        let rows = times
            .iter()
            .zip(ch1)
            .map(|(&t, &v)| SampleRow { time: t, channels: vec![v] })
            .collect();
        Recording::new(header, rows).unwrap()
    }

    fn bundle_with(points: BTreeMap<Marker, f64>, offset: i64, emg_rows: Recording) -> MultiRateBundle {
        // `PhasePoints` has no public constructor from a map; route through
        // the manifest parser instead of reaching into its private field.
        let header = "subject,motion_file,force_file,emg_file,emgMotionOffset,P0,P1,P2,S,C,D,T0,T,O,L\n";
        let row = format!(
            "s1,m.csv,f.anc,e.csv,{offset},{},{},{},{},{},{},{},{},{},{}\n",
            points.get(&Marker::P0).copied().unwrap_or(0.0),
            points.get(&Marker::P1).copied().unwrap_or(0.0),
            points.get(&Marker::P2).copied().unwrap_or(0.0),
            points.get(&Marker::S).copied().unwrap_or(0.0),
            points.get(&Marker::C).copied().unwrap_or(0.0),
            points.get(&Marker::D).copied().unwrap_or(0.0),
            points.get(&Marker::T0).copied().unwrap_or(0.0),
            points.get(&Marker::T).copied().unwrap_or(0.0),
            points.get(&Marker::O).copied().unwrap_or(0.0),
            points.get(&Marker::L).copied().unwrap_or(0.0),
        );
        let text = format!("{header}{row}");
        let entry = emg_collector::manifest::parse_manifest(&text).unwrap().remove(0);

        MultiRateBundle {
            motion: emg(&[0.0], &[0.0]),
            force: emg(&[0.0], &[0.0]),
            emg: emg_rows,
            manifest: entry,
        }
    }

    #[test]
    fn scenario_6_phase_sync_offset_window() {
        let mut points = BTreeMap::new();
        points.insert(Marker::P0, 3.012);
        points.insert(Marker::P2, 3.774);

        let emg_rows = emg(
            &[4.0, 4.012, 4.5, 4.774, 5.0],
            &[1.0, 10.0, 20.0, 30.0, 100.0],
        );
        let bundle = bundle_with(points, 1000, emg_rows);

        let result = analyse_phase_sync(&bundle, Marker::P0, Marker::P2, &EmgConfig::default()).unwrap();
        assert!((result.start_time - 4.012).abs() < 1e-9);
        assert!((result.end_time - 4.774).abs() < 1e-9);
        assert_eq!(result.mean_by_channel, vec![20.0]);
        assert_eq!(result.max_by_channel, vec![30.0]);
    }

    #[test]
    fn zero_offset_force_domain_markers_pass_through_unchanged() {
        let mut points = BTreeMap::new();
        points.insert(Marker::P0, 1.0);
        points.insert(Marker::P1, 2.0);

        let emg_rows = emg(&[1.0, 1.5, 2.0], &[5.0, 6.0, 7.0]);
        let bundle = bundle_with(points, 0, emg_rows);

        let result = analyse_phase_sync(&bundle, Marker::P0, Marker::P1, &EmgConfig::default()).unwrap();
        assert_eq!(result.start_time, 1.0);
        assert_eq!(result.end_time, 2.0);
    }

    #[test]
    fn motion_index_marker_converts_through_force_time() {
        let mut points = BTreeMap::new();
        points.insert(Marker::D, 1.0); // motion sample 1 -> force time 0.0
        points.insert(Marker::P1, 1.0);

        let emg_rows = emg(&[0.0, 0.5, 1.0], &[1.0, 2.0, 3.0]);
        let bundle = bundle_with(points, 0, emg_rows);

        let result = analyse_phase_sync(&bundle, Marker::D, Marker::P1, &EmgConfig::default()).unwrap();
        assert_eq!(result.start_time, 0.0);
        assert_eq!(result.end_time, 1.0);
    }

    #[test]
    fn marker_outside_emg_range_is_insufficient_data() {
        let mut points = BTreeMap::new();
        points.insert(Marker::P0, 100.0);
        points.insert(Marker::P1, 101.0);

        let emg_rows = emg(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]);
        let bundle = bundle_with(points, 0, emg_rows);

        let err = analyse_phase_sync(&bundle, Marker::P0, Marker::P1, &EmgConfig::default()).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::InsufficientData);
    }

    #[test]
    fn non_increasing_window_is_validation_error() {
        let mut points = BTreeMap::new();
        points.insert(Marker::P0, 2.0);
        points.insert(Marker::P1, 1.0);

        let emg_rows = emg(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]);
        let bundle = bundle_with(points, 0, emg_rows);

        let err = analyse_phase_sync(&bundle, Marker::P0, Marker::P1, &EmgConfig::default()).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::ValidationError);
    }

    #[test]
    fn invalid_config_is_rejected_before_resolving_markers() {
        let mut points = BTreeMap::new();
        points.insert(Marker::P0, 1.0);
        points.insert(Marker::P1, 2.0);

        let emg_rows = emg(&[1.0, 1.5, 2.0], &[5.0, 6.0, 7.0]);
        let bundle = bundle_with(points, 0, emg_rows);
        let cfg = EmgConfig {
            precision: 16,
            ..EmgConfig::default()
        };

        let err = analyse_phase_sync(&bundle, Marker::P0, Marker::P1, &cfg).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::ConfigValidation);
    }

    #[test]
    fn descaled_divides_channel_stats_but_not_marker_times() {
        let result = PhaseSyncResult {
            start_marker: "P0".to_string(),
            end_marker: "P2".to_string(),
            start_time: 40.0,
            end_time: 50.0,
            channel_names: vec!["ch1".to_string()],
            mean_by_channel: vec![200.0],
            max_by_channel: vec![300.0],
        };
        let out = result.descaled(1);
        assert_eq!(out.start_marker, "P0");
        assert_eq!(out.end_marker, "P2");
        assert_eq!(out.start_time, 40.0);
        assert_eq!(out.end_time, 50.0);
        assert_eq!(out.channel_names, vec!["ch1".to_string()]);
        assert_eq!(out.mean_by_channel, vec![20.0]);
        assert_eq!(out.max_by_channel, vec![30.0]);
    }
}
