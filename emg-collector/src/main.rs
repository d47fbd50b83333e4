// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use std::{fmt, fs, path::PathBuf, process::ExitCode, str::FromStr};

use clap::{Parser, ValueEnum};
use emg_collector::{
    anc, config::EmgConfig,
    manifest,
    parser::{self, RowPolicy},
};

#[derive(ValueEnum, PartialEq, Debug, Clone, Copy)]
enum Kind {
    Csv,
    Tsv,
    Anc,
    Manifest,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Csv => write!(f, "csv"),
            Kind::Tsv => write!(f, "tsv"),
            Kind::Anc => write!(f, "anc"),
            Kind::Manifest => write!(f, "manifest"),
        }
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "csv" => Ok(Kind::Csv),
            "tsv" => Ok(Kind::Tsv),
            "anc" => Ok(Kind::Anc),
            "manifest" => Ok(Kind::Manifest),
            _ => Err(format!("could not convert {s} to a known input kind")),
        }
    }
}

/// Parses one EMG/motion/force-plate recording or phase manifest and dumps
/// it as JSON, for manual inspection and scripting. Flag shapes and exit
/// codes are not part of the core's contract — this binary is a thin
/// convenience wrapper, not the product.
#[derive(Parser, Debug)]
struct Args {
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = Kind::Csv)]
    kind: Kind,

    #[arg(long, default_value_t = 10)]
    scaling_factor: i32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let result = run(&args);

    match result {
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

fn run(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = fs::read(&args.path)?;
    let text = std::str::from_utf8(&bytes)?;

    let cfg = EmgConfig {
        scaling_factor: args.scaling_factor,
        ..EmgConfig::default()
    };
    cfg.validate()?;

    let json = match args.kind {
        Kind::Csv => {
            let (header, rows) = parser::parse_table(text, ',', RowPolicy::Strict, cfg.scaling_factor)?;
            serde_json::json!({ "header": header, "rows": rows })
        }
        Kind::Tsv => {
            let (header, rows) = parser::parse_table(text, '\t', RowPolicy::Strict, cfg.scaling_factor)?;
            serde_json::json!({ "header": header, "rows": rows })
        }
        Kind::Anc => {
            let (fields, recording) = anc::parse_anc(text, cfg.scaling_factor)?;
            serde_json::json!({
                "precise_rate": fields.precise_rate,
                "channel_count": fields.channel_count,
                "header": recording.header(),
                "rows": recording.rows(),
            })
        }
        Kind::Manifest => {
            let entries = manifest::parse_manifest(text)?;
            serde_json::json!({ "entries": entries.len(), "subjects": entries.iter().map(|e| e.subject.clone()).collect::<Vec<_>>() })
        }
    };

    Ok(serde_json::to_string_pretty(&json)?)
}
