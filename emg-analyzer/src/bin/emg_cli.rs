// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! A thin consumer that exercises every core operation end-to-end for
//! manual testing. Flag shapes and exit codes are not part of the core's
//! contract — this binary only exists so the crate is runnable, the way
//! a collector crate's own `main.rs` is a thin consumer of its library.

use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use emg_analyzer::{
    analyse_phase_sync, analyse_phases, compute_max_mean, compute_max_mean_in_range, load_bundle, normalize,
    probe_file, stream_max_mean, CancellationToken, ProgressBus, StreamConfig,
};
use emg_collector::{
    config::EmgConfig,
    dataset::{Recording, SampleRow},
    manifest::{self, Marker},
    numeric::unscale,
    parser::{self, RowPolicy},
};

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-channel sliding-window max-mean over a whole recording.
    MaxMean {
        path: PathBuf,
        #[arg(long)]
        window: usize,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
    },
    /// The same, restricted to a time range.
    MaxMeanRange {
        path: PathBuf,
        #[arg(long)]
        window: usize,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
    },
    /// Normalise a recording against a reference.
    Normalize {
        primary: PathBuf,
        reference: PathBuf,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
    },
    /// Per-phase summary statistics.
    Phases {
        path: PathBuf,
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        boundaries: Vec<f64>,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
    },
    /// Chunked processing with live progress, optionally cancelled
    /// partway through.
    Stream {
        path: PathBuf,
        #[arg(long)]
        window: usize,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
        #[arg(long, default_value_t = 10_000)]
        chunk_size: usize,
        #[arg(long)]
        cancel_after_rows: Option<u64>,
    },
    /// Align a manifest entry's three files and extract a phase window.
    PhaseSync {
        dir: PathBuf,
        manifest: PathBuf,
        #[arg(long)]
        start_marker: String,
        #[arg(long)]
        end_marker: String,
        #[arg(long, default_value_t = 10)]
        scaling_factor: i32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Args::parse().command).await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn read_recording(path: &PathBuf, scaling_factor: i32) -> Result<Recording, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let (header, rows) = parser::parse_table(&text, ',', RowPolicy::Strict, scaling_factor)?;
    Ok(Recording::new(header, rows)?)
}

fn cfg_for(scaling_factor: i32) -> EmgConfig {
    EmgConfig {
        scaling_factor,
        ..EmgConfig::default()
    }
}

async fn run(command: Command) -> Result<String, Box<dyn std::error::Error>> {
    let json = match command {
        Command::MaxMean { path, window, scaling_factor } => {
            let cfg = cfg_for(scaling_factor);
            let recording = read_recording(&path, cfg.scaling_factor)?;
            let results = compute_max_mean(&recording, window, &cfg)?;
            let descaled: Vec<_> = results.iter().map(|r| r.descaled(cfg.scaling_factor)).collect();
            serde_json::to_string_pretty(&descaled)?
        }
        Command::MaxMeanRange { path, window, start, end, scaling_factor } => {
            let cfg = cfg_for(scaling_factor);
            let recording = read_recording(&path, cfg.scaling_factor)?;
            let results = compute_max_mean_in_range(&recording, window, start, end, &cfg)?;
            let descaled: Vec<_> = results.iter().map(|r| r.descaled(cfg.scaling_factor)).collect();
            serde_json::to_string_pretty(&descaled)?
        }
        Command::Normalize { primary, reference, window, scaling_factor } => {
            let cfg = cfg_for(scaling_factor);
            let primary = read_recording(&primary, cfg.scaling_factor)?;
            let reference = read_recording(&reference, cfg.scaling_factor)?;
            let result = normalize(&primary, &reference, window, &cfg)?;
            // `channels` is already a scaled/scaled ratio and needs no further
            // descaling; only `time` carries a lingering scale factor.
            let rows: Vec<SampleRow> = result
                .rows()
                .iter()
                .map(|row| SampleRow {
                    time: unscale(row.time, cfg.scaling_factor),
                    channels: row.channels.clone(),
                })
                .collect();
            serde_json::to_string_pretty(&rows)?
        }
        Command::Phases { path, labels, boundaries, scaling_factor } => {
            let cfg = cfg_for(scaling_factor);
            let recording = read_recording(&path, cfg.scaling_factor)?;
            let result = analyse_phases(&recording, &labels, &boundaries, &cfg)?;
            serde_json::to_string_pretty(&result.descaled(cfg.scaling_factor))?
        }
        Command::Stream { path, window, scaling_factor, chunk_size, cancel_after_rows } => {
            let cfg = cfg_for(scaling_factor);
            let config = StreamConfig {
                chunk_size,
                ..StreamConfig::default()
            };
            let info = probe_file(&path, ',', &config)?;
            let bus = ProgressBus::new();
            let cancel = CancellationToken::new();

            let (_handle, mut stream) = bus.subscribe();
            let watch_cancel = cancel.clone();
            let watcher = tokio::spawn(async move {
                use tokio_stream::StreamExt;
                while let Some(snapshot) = stream.next().await {
                    eprintln!("progress: {:.1}% ({})", snapshot.percentage, snapshot.status);
                    if let Some(limit) = cancel_after_rows {
                        if snapshot.processed >= limit {
                            watch_cancel.cancel();
                        }
                    }
                }
            });

            let bus_for_run = bus.clone();
            let scaling_factor = cfg.scaling_factor;
            let results = tokio::task::spawn_blocking(move || {
                stream_max_mean(
                    &info,
                    ',',
                    window,
                    &cfg,
                    &config,
                    Some(bus_for_run.as_ref()),
                    &cancel,
                )
            })
            .await??;
            bus.stop();
            let _ = watcher.await;

            let descaled: Vec<_> = results.iter().map(|r| r.descaled(scaling_factor)).collect();
            serde_json::to_string_pretty(&descaled)?
        }
        Command::PhaseSync { dir, manifest: manifest_path, start_marker, end_marker, scaling_factor } => {
            let cfg = cfg_for(scaling_factor);
            let text = fs::read_to_string(&manifest_path)?;
            let entry = manifest::parse_manifest(&text)?
                .into_iter()
                .next()
                .ok_or("manifest has no entries")?;
            let bundle = load_bundle(&dir, entry, ',', cfg.scaling_factor).await?;
            let start: Marker = start_marker.parse()?;
            let end: Marker = end_marker.parse()?;
            let result = analyse_phase_sync(&bundle, start, end, &cfg)?;
            serde_json::to_string_pretty(&result.descaled(cfg.scaling_factor))?
        }
    };

    Ok(json)
}
