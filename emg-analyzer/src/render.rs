// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! CSV rendering of the four derived artefacts: max-mean results, a
//! normalised recording, per-phase statistics, and phase-sync results.
//! Each writer honours the BOM flag carried on `EmgConfig`, prepending
//! the same three-byte marker [`emg_collector::parser::BOM`] uses for
//! input files.

use std::fmt::Write as _;

use emg_collector::{config::EmgConfig, dataset::Recording, numeric::unscale, parser::BOM};

use crate::{error::AnalyzerError, maxmean::MaxMeanResult, phase::PhaseAnalysisResult, phasesync::PhaseSyncResult};

fn finish(bom: bool, body: String) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 3);
    if bom {
        out.extend_from_slice(BOM);
    }
    out.extend_from_slice(body.as_bytes());
    out
}

/// One row per channel: its column index, window bounds, and max mean.
/// `results` are divided back down by `cfg.scaling_factor` before rendering.
pub fn render_max_mean(results: &[MaxMeanResult], cfg: &EmgConfig) -> Result<Vec<u8>, AnalyzerError> {
    cfg.validate()?;
    let mut body = String::from("channel,start_time,end_time,max_mean\n");
    for r in results {
        let r = r.descaled(cfg.scaling_factor);
        let _ = writeln!(body, "{},{},{},{}", r.column_index, r.start_time, r.end_time, r.max_mean);
    }
    Ok(finish(cfg.bom, body))
}

/// The normalised recording itself, in the same header/time/channels shape
/// as the input EMG recording. `channels` came out of `normalize` already
/// scale-correct (the scaling factor cancels between the primary and
/// reference recordings); only `time` still carries it.
pub fn render_recording(recording: &Recording, cfg: &EmgConfig) -> Result<Vec<u8>, AnalyzerError> {
    cfg.validate()?;
    let mut body = String::new();
    let _ = writeln!(body, "{}", recording.header().join(","));
    for row in recording.rows() {
        let _ = write!(body, "{}", unscale(row.time, cfg.scaling_factor));
        for v in &row.channels {
            let _ = write!(body, ",{v}");
        }
        body.push('\n');
    }
    Ok(finish(cfg.bom, body))
}

/// One row per (phase, channel): the phase's bounds plus that channel's max
/// and mean. `result` is divided back down by `cfg.scaling_factor` before
/// rendering.
pub fn render_phase_analysis(
    result: &PhaseAnalysisResult,
    channel_names: &[String],
    cfg: &EmgConfig,
) -> Result<Vec<u8>, AnalyzerError> {
    cfg.validate()?;
    let result = result.descaled(cfg.scaling_factor);
    let mut body = String::from("phase,start_time,end_time,channel,max,mean\n");
    for phase in &result.phases {
        for (i, name) in channel_names.iter().enumerate() {
            let _ = writeln!(
                body,
                "{},{},{},{name},{},{}",
                phase.phase_name,
                phase.start_time,
                phase.end_time,
                phase.max_by_channel[i],
                phase.mean_by_channel[i],
            );
        }
    }
    Ok(finish(cfg.bom, body))
}

/// One row per channel: the resolved marker window plus that channel's
/// mean and max. `result`'s channel stats are divided back down by
/// `cfg.scaling_factor` before rendering; its marker times need no such
/// adjustment (see [`PhaseSyncResult::descaled`]).
pub fn render_phase_sync(result: &PhaseSyncResult, cfg: &EmgConfig) -> Result<Vec<u8>, AnalyzerError> {
    cfg.validate()?;
    let result = result.descaled(cfg.scaling_factor);
    let mut body = String::from("start_marker,end_marker,start_time,end_time,channel,mean,max\n");
    for (i, name) in result.channel_names.iter().enumerate() {
        let _ = writeln!(
            body,
            "{},{},{},{},{name},{},{}",
            result.start_marker,
            result.end_marker,
            result.start_time,
            result.end_time,
            result.mean_by_channel[i],
            result.max_by_channel[i],
        );
    }
    Ok(finish(cfg.bom, body))
}
