// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Phase manifest parsing: a CSV whose rows each name a subject,
//! the three recording files that make up a multi-rate trial, and ten
//! phase-marker values in a fixed position.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{base_parsers::strip_bom, error::CollectorError};

/// The closed vocabulary of phase markers, in the manifest's fixed column
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    P0,
    P1,
    P2,
    S,
    C,
    D,
    T0,
    T,
    O,
    L,
}

impl Marker {
    /// The manifest's fixed column order for the ten marker fields.
    pub const ORDER: [Marker; 10] = [
        Marker::P0,
        Marker::P1,
        Marker::P2,
        Marker::S,
        Marker::C,
        Marker::D,
        Marker::T0,
        Marker::T,
        Marker::O,
        Marker::L,
    ];

    /// Which timeline a marker's raw value is expressed in.
    pub fn domain(self) -> MarkerDomain {
        match self {
            Marker::D | Marker::O => MarkerDomain::MotionIndex,
            _ => MarkerDomain::ForceTime,
        }
    }
}

impl FromStr for Marker {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P0" => Ok(Marker::P0),
            "P1" => Ok(Marker::P1),
            "P2" => Ok(Marker::P2),
            "S" => Ok(Marker::S),
            "C" => Ok(Marker::C),
            "D" => Ok(Marker::D),
            "T0" => Ok(Marker::T0),
            "T" => Ok(Marker::T),
            "O" => Ok(Marker::O),
            "L" => Ok(Marker::L),
            _ => Err(CollectorError::validation(format!("{s} is not a known phase marker"))),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Marker::P0 => "P0",
            Marker::P1 => "P1",
            Marker::P2 => "P2",
            Marker::S => "S",
            Marker::C => "C",
            Marker::D => "D",
            Marker::T0 => "T0",
            Marker::T => "T",
            Marker::O => "O",
            Marker::L => "L",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDomain {
    /// Seconds in the force-plate timeline.
    ForceTime,
    /// 1-based sample index into the motion timeline.
    MotionIndex,
}

/// The raw marker values named by one manifest row, keyed by marker. Each
/// value is in the domain given by [`Marker::domain`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePoints(BTreeMap<Marker, f64>);

impl PhasePoints {
    pub fn get(&self, marker: Marker) -> f64 {
        self.0.get(&marker).copied().unwrap_or(0.0)
    }
}

/// One row of the phase manifest: a subject, the three files that make up
/// its multi-rate trial, the EMG/motion sample offset, and the phase
/// markers.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseManifestEntry {
    pub subject: String,
    pub motion_file: String,
    pub force_file: String,
    pub emg_file: String,
    /// Count of EMG samples preceding the motion/force time-zero.
    pub emg_motion_offset: i64,
    pub points: PhasePoints,
}

const SENTINELS: &[&str] = &["", "NA", "N/A", "x", "X", "-"];

fn parse_marker_value(cell: &str) -> Result<f64, CollectorError> {
    let trimmed = cell.trim();
    if SENTINELS.contains(&trimmed) {
        return Ok(0.0);
    }
    trimmed
        .parse()
        .map_err(|_| CollectorError::parse("phase marker", format!("{trimmed:?} is not numeric")))
}

/// Parses a phase manifest: a CSV header row followed by data rows with at
/// least 15 fixed-position fields (subject, motion/force/EMG file names,
/// `emgMotionOffset`, then the ten markers in [`Marker::ORDER`]).
pub fn parse_manifest(text: &str) -> Result<Vec<PhaseManifestEntry>, CollectorError> {
    let text = strip_bom(text);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    lines.next().ok_or_else(|| CollectorError::schema("manifest has no header line"))?;

    let mut entries = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 15 {
            return Err(CollectorError::schema(format!(
                "manifest row {} has {} fields, need at least 15",
                line_no + 2,
                fields.len()
            ))
            .context("line", line_no + 2));
        }

        let emg_motion_offset: i64 = fields[4].parse().map_err(|_| {
            CollectorError::parse("emgMotionOffset", format!("{:?} is not an integer", fields[4]))
        })?;

        let mut points = BTreeMap::new();
        for (marker, cell) in Marker::ORDER.iter().zip(&fields[5..15]) {
            points.insert(*marker, parse_marker_value(cell)?);
        }

        entries.push(PhaseManifestEntry {
            subject: fields[0].to_string(),
            motion_file: fields[1].to_string(),
            force_file: fields[2].to_string(),
            emg_file: fields[3].to_string(),
            emg_motion_offset,
            points: PhasePoints(points),
        });
    }

    Ok(entries)
}
