// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Force-plate (ANC) recording parser: a tab-separated text file with a
//! 12-line header block followed by whitespace-delimited data rows.
//!
//! The header block's exact layout is vendor-specific and has been seen to
//! vary in which line carries which field; this parser looks for known
//! header tokens by name rather than assuming fixed line numbers, and takes
//! the header block's trailing wide rows (channel names, rates, ranges) in
//! the order they appear rather than by a hardcoded line index.

use std::collections::BTreeMap;

use crate::{
    dataset::{Recording, SampleRow},
    error::CollectorError,
    numeric::parse_scaled,
};

const HEADER_LINES: usize = 12;

/// The key/value fields read from the ANC header block.
#[derive(Debug, Clone, Default)]
pub struct AncHeaderFields {
    pub file_type: Option<String>,
    pub board_type: Option<String>,
    pub trial_name: Option<String>,
    pub trial_number: Option<String>,
    pub duration_secs: Option<f64>,
    pub channel_count: Option<usize>,
    pub bit_depth: Option<String>,
    /// Sample rate in Hz (the "PreciseRate" header token).
    pub precise_rate: Option<f64>,
}

fn field_lookup(map: &BTreeMap<String, String>, key: &str) -> Option<String> {
    map.get(key).cloned()
}

/// The fixed set of metadata keys the header block carries as key/value
/// lines. Anything else with two or more tab-separated tokens is a wide row
/// (channel names, rates, ranges) — a 2-channel file's wide rows are
/// otherwise indistinguishable from a key/value line by token count alone.
const KNOWN_HEADER_KEYS: &[&str] = &[
    "File_Type",
    "Board_Type",
    "Trial_Name",
    "Trial#",
    "Duration(Sec.)",
    "#Channels",
    "BitDepth",
    "PreciseRate",
];

/// Parses the first [`HEADER_LINES`] lines of an ANC file into key/value
/// fields plus the channel-name/rate/range rows. Tolerant of which exact
/// line carries which token.
fn parse_header_block(lines: &[&str]) -> (AncHeaderFields, Vec<Vec<String>>) {
    let mut kv = BTreeMap::new();
    let mut wide_rows = Vec::new();

    for line in lines {
        let tokens: Vec<String> = line.split('\t').map(str::trim).map(str::to_string).collect();
        match tokens.as_slice() {
            [key, value] if KNOWN_HEADER_KEYS.contains(&key.as_str()) => {
                kv.insert(key.clone(), value.clone());
            }
            many if many.len() >= 2 => wide_rows.push(many.to_vec()),
            _ => {}
        }
    }

    let fields = AncHeaderFields {
        file_type: field_lookup(&kv, "File_Type"),
        board_type: field_lookup(&kv, "Board_Type"),
        trial_name: field_lookup(&kv, "Trial_Name"),
        trial_number: field_lookup(&kv, "Trial#"),
        duration_secs: field_lookup(&kv, "Duration(Sec.)").and_then(|v| v.parse().ok()),
        channel_count: field_lookup(&kv, "#Channels").and_then(|v| v.parse().ok()),
        bit_depth: field_lookup(&kv, "BitDepth"),
        precise_rate: field_lookup(&kv, "PreciseRate").and_then(|v| v.parse().ok()),
    };

    (fields, wide_rows)
}

/// Parses a full ANC file: header block plus whitespace-delimited data
/// rows (first token is time, remaining tokens are channel values).
pub fn parse_anc(text: &str, scaling_factor: i32) -> Result<(AncHeaderFields, Recording), CollectorError> {
    let mut lines = text.lines();
    let header_lines: Vec<&str> = (&mut lines).take(HEADER_LINES).collect();
    if header_lines.len() < HEADER_LINES {
        return Err(CollectorError::schema(format!(
            "ANC file has only {} header lines, need {HEADER_LINES}",
            header_lines.len()
        )));
    }

    let (fields, wide_rows) = parse_header_block(&header_lines);

    // The channel-names row is the first wide row that contains no purely
    // numeric tokens; rates/ranges rows are numeric and follow it.
    let channel_names = wide_rows
        .iter()
        .find(|row| row.iter().any(|t| t.parse::<f64>().is_err()))
        .cloned()
        .unwrap_or_default();

    if channel_names.is_empty() {
        return Err(CollectorError::schema("could not locate a channel-names row in ANC header block"));
    }

    let mut header = vec!["time".to_string()];
    header.extend(channel_names.iter().cloned());

    let mut rows = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.len() {
            return Err(CollectorError::schema(format!(
                "ANC data row {} has {} tokens, header names {}",
                line_no + HEADER_LINES + 1,
                tokens.len(),
                header.len()
            )));
        }

        let values: Vec<f64> = tokens
            .iter()
            .map(|t| parse_scaled(t, scaling_factor))
            .collect::<Result<_, _>>()?;

        let (time, channels) = values.split_first().expect("row has at least one token");
        rows.push(SampleRow {
            time: *time,
            channels: channels.to_vec(),
        });
    }

    let recording = Recording::new(header, rows)?;
    Ok((fields, recording))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_anc() -> String {
        let mut lines = vec![
            "File_Type\tANC".to_string(),
            "Board_Type\tUSB2".to_string(),
            "Trial_Name\ttrial001".to_string(),
            "Trial#\t1".to_string(),
            "Duration(Sec.)\t10".to_string(),
            "#Channels\t2".to_string(),
            "BitDepth\t16".to_string(),
            "PreciseRate\t1000".to_string(),
            "Fx\tFy".to_string(),
            "1000\t1000".to_string(),
            "100\t100".to_string(),
            "".to_string(),
        ];
        assert_eq!(lines.len(), HEADER_LINES);
        lines.push("0.0 1.0 2.0".to_string());
        lines.push("0.001 1.5 2.5".to_string());
        lines.join("\n")
    }

    #[test]
    fn parses_header_fields_and_rows() {
        let text = sample_anc();
        let (fields, recording) = parse_anc(&text, 0).unwrap();
        assert_eq!(fields.precise_rate, Some(1000.0));
        assert_eq!(fields.channel_count, Some(2));
        assert_eq!(recording.header(), &["time", "Fx", "Fy"]);
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.rows()[1].time, 0.001);
    }

    #[test]
    fn rejects_short_header() {
        let err = parse_anc("only\none\nline\n", 0).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::SchemaError);
    }

    #[test]
    fn three_channel_file_still_locates_the_wide_row() {
        let mut lines = vec![
            "File_Type\tANC".to_string(),
            "Board_Type\tUSB2".to_string(),
            "Trial_Name\ttrial001".to_string(),
            "Trial#\t1".to_string(),
            "Duration(Sec.)\t10".to_string(),
            "#Channels\t3".to_string(),
            "BitDepth\t16".to_string(),
            "PreciseRate\t1000".to_string(),
            "Fx\tFy\tFz".to_string(),
            "1000\t1000\t1000".to_string(),
            "100\t100\t100".to_string(),
            "".to_string(),
        ];
        assert_eq!(lines.len(), HEADER_LINES);
        lines.push("0.0 1.0 2.0 3.0".to_string());
        let text = lines.join("\n");

        let (_, recording) = parse_anc(&text, 0).unwrap();
        assert_eq!(recording.header(), &["time", "Fx", "Fy", "Fz"]);
    }
}
