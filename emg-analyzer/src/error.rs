// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The analyser-level error type. Wraps [`CollectorError`] and adds the
//! codes that only arise once rows are turned into statistics: validation
//! of windows/phases, insufficient data, domain errors (division by a
//! zero reference), memory pressure, and cancellation.

use std::collections::BTreeMap;

use emg_collector::error::{CollectorError, ErrorCode};
use thiserror::Error;

pub type ErrorContext = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error("{message}")]
    Validation {
        message: String,
        context: ErrorContext,
    },
    #[error("{message}")]
    InsufficientData {
        message: String,
        context: ErrorContext,
    },
    #[error("{message}")]
    Domain {
        message: String,
        context: ErrorContext,
    },
    #[error("calculation failed: {0}")]
    Calculation(String),
    #[error("input is {actual} bytes, over the {limit} byte limit")]
    FileTooLarge { actual: u64, limit: u64 },
    #[error("memory budget exceeded: {0}")]
    Memory(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Unknown(String),
}

impl AnalyzerError {
    pub fn validation(message: impl Into<String>) -> Self {
        AnalyzerError::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        AnalyzerError::InsufficientData {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        AnalyzerError::Domain {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn context(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        let value = value.to_string();
        match &mut self {
            AnalyzerError::Validation { context, .. }
            | AnalyzerError::InsufficientData { context, .. }
            | AnalyzerError::Domain { context, .. } => {
                context.insert(key.into(), value);
            }
            _ => {}
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AnalyzerError::Collector(e) => e.code(),
            AnalyzerError::Validation { .. } => ErrorCode::ValidationError,
            AnalyzerError::InsufficientData { .. } => ErrorCode::InsufficientData,
            AnalyzerError::Domain { .. } => ErrorCode::DomainError,
            AnalyzerError::Calculation(_) => ErrorCode::Calculation,
            AnalyzerError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            AnalyzerError::Memory(_) => ErrorCode::Memory,
            AnalyzerError::Cancelled => ErrorCode::Cancelled,
            AnalyzerError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn recoverable(&self) -> bool {
        self.code().recoverable()
    }
}
