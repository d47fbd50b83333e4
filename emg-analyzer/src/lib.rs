// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Derived artefacts over [`emg_collector`] recordings: sliding-window
//! max-mean, amplitude normalisation, per-phase statistics, chunked
//! large-file processing, multi-rate phase-sync, and the progress bus
//! they report through.

pub mod error;
pub mod maxmean;
pub mod normalize;
pub mod phase;
pub mod phasesync;
pub mod progress;
pub mod render;
pub mod streaming;

pub use error::AnalyzerError;
pub use maxmean::{compute_max_mean, compute_max_mean_in_range, MaxMeanResult};
pub use normalize::normalize;
pub use phase::{analyse_phases, PhaseAnalysisResult, PhaseResult};
pub use phasesync::{analyse_phase_sync, load_bundle, MultiRateBundle, PhaseSyncResult};
pub use progress::{ProgressBus, ProgressSnapshot};
pub use streaming::{probe_file, stream_max_mean, CancellationToken, FileInfo, StreamConfig};
