// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Amplitude normalisation of a primary recording against a
//! per-channel scalar derived from a reference recording (typically an
//! MVIC trial).

use emg_collector::{
    config::EmgConfig,
    dataset::{Recording, SampleRow},
    numeric::sliding_max_mean,
};

use crate::error::AnalyzerError;

/// Derives the per-channel reference scalar `r_c` used by [`normalize`].
///
/// - If `reference` has exactly one data row, `r_c` is that row's channel
///   value (the MVIC-row case).
/// - Otherwise, if `window` is given, `r_c` is the sliding-max-mean over the
///   reference's channel with that window size.
/// - Otherwise the reference is itself treated as a channel-indexed scalar
///   table (e.g. a previously-computed max-mean result re-ingested as a
///   one-row-per-metric recording): `r_c` is the first row's channel value,
///   rather than treating the ambiguous multi-row/no-window case as an
///   error.
pub fn resolve_reference_scalars(
    reference: &Recording,
    window: Option<usize>,
) -> Result<Vec<f64>, AnalyzerError> {
    if reference.is_empty() {
        return Err(AnalyzerError::validation("reference recording has no rows"));
    }

    let channel_count = reference.channel_count();

    if reference.len() == 1 {
        return Ok(reference.rows()[0].channels.clone());
    }

    if let Some(w) = window {
        let mut scalars = Vec::with_capacity(channel_count);
        for c in 1..=channel_count {
            let series = reference.channel_series(c);
            let (_, mean) = sliding_max_mean(&series, w)
                .ok_or_else(|| AnalyzerError::validation("reference window size exceeds available rows"))?;
            scalars.push(mean);
        }
        return Ok(scalars);
    }

    Ok(reference.rows()[0].channels.clone())
}

/// Divides every channel of `primary` by a per-channel scalar derived from
/// `reference` (see [`resolve_reference_scalars`]). `window` selects the
/// sliding-max-mean fallback policy when `reference` has more than one row.
pub fn normalize(
    primary: &Recording,
    reference: &Recording,
    window: Option<usize>,
    cfg: &EmgConfig,
) -> Result<Recording, AnalyzerError> {
    cfg.validate()?;
    if primary.channel_count() != reference.channel_count() {
        return Err(AnalyzerError::validation(format!(
            "primary has {} channels, reference has {}",
            primary.channel_count(),
            reference.channel_count()
        ))
        .context("primary_channels", primary.channel_count())
        .context("reference_channels", reference.channel_count()));
    }

    let scalars = resolve_reference_scalars(reference, window)?;

    for (c, &r_c) in scalars.iter().enumerate() {
        if r_c == 0.0 {
            return Err(AnalyzerError::domain(format!(
                "reference scalar for channel {} is zero",
                c + 1
            ))
            .context("channel", c + 1));
        }
    }

    let rows = primary
        .rows()
        .iter()
        .map(|row| SampleRow {
            time: row.time,
            channels: row
                .channels
                .iter()
                .zip(&scalars)
                .map(|(v, r)| v / r)
                .collect(),
        })
        .collect();

    Ok(Recording::new(primary.header().to_vec(), rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_collector::dataset::SampleRow;

    fn recording(times: &[f64], channels: &[&[f64]]) -> Recording {
        let header_len = channels.first().map_or(0, |c| c.len()) + 1;
        let header: Vec<String> = (0..header_len)
            .map(|i| if i == 0 { "time".to_string() } else { format!("ch{i}") })
            .collect();
        let rows = times
            .iter()
            .zip(channels)
            .map(|(&t, cs)| SampleRow {
                time: t,
                channels: cs.to_vec(),
            })
            .collect();
        Recording::new(header, rows).unwrap()
    }

    #[test]
    fn scenario_4_mvic_row_normalisation() {
        let primary = recording(&[0.0], &[&[50.0, 200.0, 100.0]]);
        let reference = recording(&[0.0], &[&[100.0, 100.0, 100.0]]);
        let out = normalize(&primary, &reference, None, &EmgConfig::default()).unwrap();
        assert_eq!(out.rows()[0].channels, vec![0.5, 2.0, 1.0]);
        assert_eq!(out.rows()[0].time, 0.0);
    }

    #[test]
    fn normalizing_by_all_ones_is_identity() {
        let primary = recording(&[0.0, 1.0], &[&[1.0, 2.0], &[3.0, 4.0]]);
        let reference = recording(&[0.0], &[&[1.0, 1.0]]);
        let out = normalize(&primary, &reference, None, &EmgConfig::default()).unwrap();
        assert_eq!(out, primary);
    }

    #[test]
    fn reversible_with_reciprocal_scalars() {
        let primary = recording(&[0.0, 1.0], &[&[10.0, 20.0], &[30.0, 40.0]]);
        let reference = recording(&[0.0], &[&[2.0, 5.0]]);
        let normalized = normalize(&primary, &reference, None, &EmgConfig::default()).unwrap();

        let inverse_reference = recording(&[0.0], &[&[0.5, 0.2]]);
        let restored = normalize(&normalized, &inverse_reference, None, &EmgConfig::default()).unwrap();

        for (a, b) in restored.rows().iter().zip(primary.rows()) {
            for (x, y) in a.channels.iter().zip(&b.channels) {
                assert!((x - y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn zero_reference_scalar_is_domain_error() {
        let primary = recording(&[0.0], &[&[1.0]]);
        let reference = recording(&[0.0], &[&[0.0]]);
        let err = normalize(&primary, &reference, None, &EmgConfig::default()).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::DomainError);
    }

    #[test]
    fn channel_count_mismatch_is_validation_error() {
        let primary = recording(&[0.0], &[&[1.0, 2.0]]);
        let reference = recording(&[0.0], &[&[1.0]]);
        let err = normalize(&primary, &reference, None, &EmgConfig::default()).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::ValidationError);
    }

    #[test]
    fn invalid_config_is_rejected_before_normalizing() {
        let primary = recording(&[0.0], &[&[1.0]]);
        let reference = recording(&[0.0], &[&[1.0]]);
        let cfg = EmgConfig {
            precision: 16,
            ..EmgConfig::default()
        };
        let err = normalize(&primary, &reference, None, &cfg).unwrap_err();
        assert_eq!(err.code(), emg_collector::error::ErrorCode::ConfigValidation);
    }

    #[test]
    fn sliding_window_reference_uses_max_mean_scalar() {
        let primary = recording(&[0.0], &[&[10.0]]);
        let reference = recording(&[0.0, 1.0, 2.0], &[&[1.0], &[2.0], &[9.0]]);
        let out = normalize(&primary, &reference, Some(1), &EmgConfig::default()).unwrap();
        assert_eq!(out.rows()[0].channels, vec![10.0 / 9.0]);
    }
}
