// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Parses a delimited tabular recording (EMG or motion, comma-
//! separated; force-plate ANC data rows, tab-separated) into a header and
//! an ordered sequence of [`SampleRow`]s.

use combine::EasyParser;

use crate::{
    base_parsers::{row, strip_bom},
    dataset::SampleRow,
    error::CollectorError,
    numeric::parse_scaled,
};

/// How to treat a data row whose column count disagrees with the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    /// Reject the whole input with `SchemaError`.
    Strict,
    /// Log and skip the offending row, continuing the run (the streaming
    /// processor).
    SkipMalformed,
}

/// The UTF-8 byte order mark, prepended to an output file when the BOM flag
/// is set.
pub const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parses a single header line into its column names.
pub fn parse_header_line(line: &str, delimiter: char) -> Result<Vec<String>, CollectorError> {
    let (header, rest) = row(delimiter)
        .easy_parse(line)
        .map_err(|e| CollectorError::parse("header", e.to_string()))?;
    if !rest.is_empty() {
        return Err(CollectorError::schema("trailing content after header row"));
    }
    Ok(header)
}

/// Parses a single data line against an already-known column count,
/// applying `scaling_factor` to every cell via [`parse_scaled`]. Used both
/// by [`parse_table`] and by the streaming processor, which never
/// holds a whole file's lines in memory at once.
pub fn parse_data_line(
    line: &str,
    delimiter: char,
    expected_columns: usize,
    scaling_factor: i32,
) -> Result<SampleRow, CollectorError> {
    let (cells, rest) = row(delimiter)
        .easy_parse(line)
        .map_err(|e| CollectorError::parse("row", e.to_string()))?;

    if !rest.is_empty() || cells.len() != expected_columns {
        return Err(CollectorError::schema(format!(
            "row has {} columns, expected {expected_columns}",
            cells.len()
        ))
        .context("expected_columns", expected_columns)
        .context("actual_columns", cells.len()));
    }

    let values: Vec<f64> = cells
        .iter()
        .map(|c| parse_scaled(c, scaling_factor))
        .collect::<Result<_, _>>()?;

    let (time, channels) = values.split_first().expect("row has at least one column");
    Ok(SampleRow {
        time: *time,
        channels: channels.to_vec(),
    })
}

/// Parses `text` (already UTF-8 decoded) as a delimited table.
///
/// `scaling_factor` is applied to every numeric cell via [`parse_scaled`].
/// The first non-empty line is the header; the first column of each data
/// row is time, the rest are channel values.
pub fn parse_table(
    text: &str,
    delimiter: char,
    policy: RowPolicy,
    scaling_factor: i32,
) -> Result<(Vec<String>, Vec<SampleRow>), CollectorError> {
    let text = strip_bom(text);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| CollectorError::schema("input has no header line"))?;
    let header = parse_header_line(header_line, delimiter)?;

    let expected = header.len();
    let mut sample_rows = Vec::new();

    for (line_no, line) in lines.enumerate() {
        match parse_data_line(line, delimiter, expected, scaling_factor) {
            Ok(sample_row) => sample_rows.push(sample_row),
            Err(e) => {
                if policy == RowPolicy::SkipMalformed {
                    tracing::warn!(line = line_no + 2, error = %e, "skipping malformed row");
                    continue;
                }
                return Err(e);
            }
        }
    }

    Ok((header, sample_rows))
}
