// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The in-memory recording: header plus rows, with the column-arity
//! invariant enforced at construction.

use crate::error::CollectorError;

/// One instant of one recording: a time value and an ordered sequence of
/// channel values.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SampleRow {
    pub time: f64,
    pub channels: Vec<f64>,
}

/// A parsed recording: ordered header (first element is the time column
/// name) and ordered, time-ascending rows, all sharing the same channel
/// count.
///
/// Read-only once constructed; the only mutation path is building a new
/// `Recording` (see [`crate::normalize`] in `emg-analyzer`, which returns a
/// fresh value rather than mutating in place).
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    header: Vec<String>,
    rows: Vec<SampleRow>,
}

impl Recording {
    /// Builds a `Recording`, checking that every row's channel count equals
    /// `header.len() - 1` and that `header` names at least a time column
    /// and one channel.
    pub fn new(header: Vec<String>, rows: Vec<SampleRow>) -> Result<Self, CollectorError> {
        if header.len() < 2 {
            return Err(CollectorError::schema("header must name a time column and at least one channel"));
        }

        let expected = header.len() - 1;
        for (i, row) in rows.iter().enumerate() {
            if row.channels.len() != expected {
                return Err(CollectorError::schema(format!(
                    "row {i} has {} channels, header names {expected}",
                    row.channels.len()
                ))
                .context("row", i)
                .context("expected_channels", expected)
                .context("actual_channels", row.channels.len()));
            }
        }

        Ok(Recording { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of channels (header length minus the time column).
    pub fn channel_count(&self) -> usize {
        self.header.len() - 1
    }

    /// Column name for a 1-based channel index.
    pub fn channel_name(&self, column_index: usize) -> Option<&str> {
        self.header.get(column_index).map(String::as_str)
    }

    /// All values of one channel, in row order. `c` is 1-based (column 0 is
    /// time), matching [`crate::error::ErrorCode`]-bearing operations
    /// elsewhere in the pipeline.
    pub fn channel_series(&self, c: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r.channels[c - 1]).collect()
    }

    pub fn times(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.time).collect()
    }
}
