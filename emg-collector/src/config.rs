// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The configuration value object the core receives by value. Loading,
//! saving, and editing this struct are the responsibility of an external
//! collaborator; the core only ever reads it.

use std::path::PathBuf;

use crate::error::CollectorError;

/// Immutable, cheaply-cloned configuration handed to every core operation.
/// The core never mutates it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmgConfig {
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: i32,
    #[serde(default = "default_precision")]
    pub precision: u8,
    #[serde(default = "default_phase_labels")]
    pub phase_labels: Vec<String>,
    #[serde(default)]
    pub bom: bool,
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub operate_dir: Option<PathBuf>,
}

fn default_scaling_factor() -> i32 {
    10
}

fn default_precision() -> u8 {
    10
}

fn default_phase_labels() -> Vec<String> {
    vec!["phase1".into(), "phase2".into(), "phase3".into(), "phase4".into()]
}

impl Default for EmgConfig {
    fn default() -> Self {
        EmgConfig {
            scaling_factor: default_scaling_factor(),
            precision: default_precision(),
            phase_labels: default_phase_labels(),
            bom: false,
            input_dir: None,
            output_dir: None,
            operate_dir: None,
        }
    }
}

impl EmgConfig {
    /// Validates `precision` is in range; called by every analyser operation
    /// before use (`ConfigValidation` on failure).
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.precision > 15 {
            return Err(CollectorError::config_validation(format!(
                "precision {} is outside the allowed range [0, 15]",
                self.precision
            ))
            .context("precision", self.precision));
        }
        Ok(())
    }
}
