// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Chunked processing of recordings too large to hold in
//! memory. [`probe_file`] does a cheap preflight pass (size + row count);
//! [`stream_max_mean`] then walks the file once, updating an O(1)
//! per-channel running sum rather than materialising a [`Recording`].
//!
//! [`Recording`]: emg_collector::dataset::Recording

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use emg_collector::{
    config::EmgConfig,
    error::CollectorError,
    parser::{parse_data_line, parse_header_line},
};

use crate::{
    error::AnalyzerError,
    maxmean::MaxMeanResult,
    progress::{ProgressBus, ProgressSnapshot},
};

/// Each channel's ring buffer is pre-sized to this multiple of the window,
/// so it never reallocates as the stream scrolls past a boundary.
const RING_BUFFER_MULTIPLIER: usize = 2;

/// Tuning knobs for a streaming run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Rows between progress publishes and memory-budget checks.
    pub chunk_size: usize,
    /// Resident-set budget; exceeding it fails the run with `Memory`.
    pub memory_budget_mib: f64,
    /// Preflight rejects files larger than this with `FileTooLarge`.
    pub max_file_size_bytes: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            chunk_size: 10_000,
            memory_budget_mib: 512.0,
            max_file_size_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

/// The result of a preflight pass over a candidate input: its size, header,
/// and a full row count so a caller can size a progress bar up front.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub header: Vec<String>,
    pub row_count: u64,
}

fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}

/// Reads the file's size and header, and counts its data rows, without
/// holding more than one line in memory at a time.
pub fn probe_file(
    path: &Path,
    delimiter: char,
    config: &StreamConfig,
) -> Result<FileInfo, AnalyzerError> {
    let size_bytes = fs::metadata(path).map_err(CollectorError::from)?.len();
    if size_bytes > config.max_file_size_bytes {
        return Err(AnalyzerError::FileTooLarge {
            actual: size_bytes,
            limit: config.max_file_size_bytes,
        });
    }

    let file = File::open(path).map_err(CollectorError::from)?;
    let mut reader = BufReader::new(file);

    let mut header_line = String::new();
    reader.read_line(&mut header_line).map_err(CollectorError::from)?;
    let header = parse_header_line(strip_bom(header_line.trim_end_matches(['\n', '\r'])), delimiter)?;

    let row_count = reader
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .count() as u64;

    Ok(FileInfo {
        path: path.to_path_buf(),
        size_bytes,
        header,
        row_count,
    })
}

/// A cheap, cloneable cooperative-cancellation flag shared between a runner
/// and whoever is allowed to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-channel incremental sliding-max-mean accumulator. `push` is O(1); the
/// running sum is adjusted by exactly the value leaving the window rather
/// than re-summed.
struct ChannelAccumulator {
    window_size: usize,
    times: VecDeque<f64>,
    values: VecDeque<f64>,
    sum: f64,
    best: Option<(f64, f64, f64)>,
}

impl ChannelAccumulator {
    fn new(window_size: usize) -> Self {
        let capacity = window_size * RING_BUFFER_MULTIPLIER;
        ChannelAccumulator {
            window_size,
            times: VecDeque::with_capacity(capacity),
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
            best: None,
        }
    }

    fn push(&mut self, time: f64, value: f64) {
        self.times.push_back(time);
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.window_size {
            self.sum -= self.values.pop_front().expect("buffer is over capacity");
            self.times.pop_front();
        }

        if self.values.len() == self.window_size {
            let mean = self.sum / self.window_size as f64;
            let is_better = match self.best {
                None => true,
                Some((_, _, best_mean)) => mean > best_mean,
            };
            if is_better {
                let start_time = *self.times.front().expect("window is full");
                self.best = Some((start_time, time, mean));
            }
        }
    }
}

fn check_memory_budget(config: &StreamConfig) -> Result<(), AnalyzerError> {
    let sample = memory_benchmarking::sample_memory();
    let usage = memory_benchmarking::MemoryUsage::try_from(std::slice::from_ref(&sample))
        .map_err(|e| AnalyzerError::Memory(e.to_string()))?;

    let resident_mib = usage.max_rss / (1024.0 * 1024.0);
    if resident_mib > config.memory_budget_mib {
        return Err(AnalyzerError::Memory(format!(
            "resident memory {resident_mib:.1} MiB exceeds budget {:.1} MiB",
            config.memory_budget_mib
        )));
    }
    Ok(())
}

/// Streams `info.path` once, computing the sliding-window maximum mean for
/// every channel without ever holding the whole recording in memory.
///
/// Malformed rows are logged and skipped, matching
/// [`emg_collector::parser::RowPolicy::SkipMalformed`]. Progress is
/// published every `config.chunk_size` rows, which is also when the
/// resident-memory budget is checked and `cancel` is polled.
pub fn stream_max_mean(
    info: &FileInfo,
    delimiter: char,
    window_size: usize,
    cfg: &EmgConfig,
    config: &StreamConfig,
    progress: Option<&ProgressBus>,
    cancel: &CancellationToken,
) -> Result<Vec<MaxMeanResult>, AnalyzerError> {
    cfg.validate()?;
    if window_size == 0 {
        return Err(AnalyzerError::validation("window size must be at least 1"));
    }
    if info.row_count < window_size as u64 {
        return Err(AnalyzerError::insufficient_data(format!(
            "file has {} data rows, window needs at least {window_size}",
            info.row_count
        )));
    }
    let channel_count = info.header.len().saturating_sub(1);
    if channel_count == 0 {
        return Err(AnalyzerError::validation("header has no channel columns"));
    }

    let file = File::open(&info.path).map_err(CollectorError::from)?;
    let mut reader = BufReader::new(file);
    let mut header_line = String::new();
    reader.read_line(&mut header_line).map_err(CollectorError::from)?;

    let mut channels: Vec<ChannelAccumulator> = (0..channel_count)
        .map(|_| ChannelAccumulator::new(window_size))
        .collect();

    let started_at = Instant::now();
    let mut processed: u64 = 0;

    for line in reader.lines() {
        if cancel.is_cancelled() {
            if let Some(bus) = progress {
                bus.publish(ProgressSnapshot::terminal("cancelled", started_at.elapsed(), processed));
            }
            return Err(AnalyzerError::Cancelled);
        }

        let line = line.map_err(CollectorError::from)?;
        if line.trim().is_empty() {
            continue;
        }

        let sample_row = match parse_data_line(&line, delimiter, info.header.len(), cfg.scaling_factor) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row during stream");
                continue;
            }
        };

        for (acc, &value) in channels.iter_mut().zip(&sample_row.channels) {
            acc.push(sample_row.time, value);
        }
        processed += 1;

        if processed % config.chunk_size as u64 == 0 {
            if let Some(bus) = progress {
                bus.publish(ProgressSnapshot::new(
                    processed,
                    info.row_count,
                    "streaming",
                    started_at.elapsed(),
                ));
            }
            check_memory_budget(config)?;
        }
    }

    if let Some(bus) = progress {
        bus.publish(ProgressSnapshot::terminal("done", started_at.elapsed(), info.row_count));
    }

    channels
        .into_iter()
        .enumerate()
        .map(|(i, acc)| {
            acc.best
                .map(|(start_time, end_time, max_mean)| MaxMeanResult {
                    column_index: i + 1,
                    start_time,
                    end_time,
                    max_mean,
                })
                .ok_or_else(|| {
                    AnalyzerError::insufficient_data(format!("channel {} never saw a full window", i + 1))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn probe_reports_size_header_and_row_count() {
        let f = write_fixture("time,ch1,ch2\n1.0,100,200\n2.0,150,250\n3.0,300,400\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        assert_eq!(info.header, vec!["time", "ch1", "ch2"]);
        assert_eq!(info.row_count, 3);
    }

    #[test]
    fn probe_rejects_oversized_file() {
        let f = write_fixture("time,ch1\n1.0,2.0\n");
        let config = StreamConfig {
            max_file_size_bytes: 1,
            ..StreamConfig::default()
        };
        let err = probe_file(f.path(), ',', &config).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::FileTooLarge);
    }

    #[test]
    fn stream_matches_in_memory_sliding_max_mean() {
        let f = write_fixture("time,ch1\n1.0,100\n2.0,200\n3.0,150\n4.0,300\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let results = stream_max_mean(
            &info,
            ',',
            2,
            &EmgConfig::default(),
            &StreamConfig::default(),
            None,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].start_time, 3.0);
        assert_eq!(results[0].end_time, 4.0);
        assert_eq!(results[0].max_mean, 225.0);
    }

    #[test]
    fn stream_skips_malformed_rows_and_keeps_going() {
        let f = write_fixture("time,ch1\n1.0,100\nbroken\n2.0,200\n3.0,150\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let results = stream_max_mean(
            &info,
            ',',
            2,
            &EmgConfig::default(),
            &StreamConfig::default(),
            None,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(results[0].max_mean, 175.0);
    }

    #[test]
    fn cancellation_token_stops_the_stream() {
        let f = write_fixture("time,ch1\n1.0,100\n2.0,200\n3.0,150\n4.0,300\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = stream_max_mean(&info, ',', 2, &EmgConfig::default(), &StreamConfig::default(), None, &cancel)
            .unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_publishes_a_terminal_snapshot_before_returning() {
        let f = write_fixture("time,ch1\n1.0,100\n2.0,200\n3.0,150\n4.0,300\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let bus = ProgressBus::new();
        let (_handle, mut stream) = bus.subscribe();

        let err = stream_max_mean(
            &info,
            ',',
            2,
            &EmgConfig::default(),
            &StreamConfig::default(),
            Some(bus.as_ref()),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::Cancelled);

        use tokio_stream::StreamExt;
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.status, "cancelled");
        assert_eq!(snapshot.percentage, 100.0);
    }

    #[test]
    fn window_exceeding_row_count_is_insufficient_data() {
        let f = write_fixture("time,ch1\n1.0,100\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let err = stream_max_mean(
            &info,
            ',',
            5,
            &EmgConfig::default(),
            &StreamConfig::default(),
            None,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::InsufficientData);
    }

    #[test]
    fn invalid_config_is_rejected_before_streaming() {
        let f = write_fixture("time,ch1\n1.0,100\n2.0,200\n3.0,150\n4.0,300\n");
        let info = probe_file(f.path(), ',', &StreamConfig::default()).unwrap();
        let cfg = EmgConfig {
            precision: 16,
            ..EmgConfig::default()
        };
        let err = stream_max_mean(&info, ',', 2, &cfg, &StreamConfig::default(), None, &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::ConfigValidation);
    }
}
