//! Spillover compensation.
//!
//! Compensated values `X` satisfy `spill^T · X^T = data^T` over the fluorescence columns,
//! i.e. the data is right-multiplied by the inverse spillover matrix. The system is solved
//! through an LU decomposition rather than by forming the inverse.

use super::channels::ChannelMapping;
use super::spillover::SpilloverMatrix;
use crate::error::{AppResult, CytoError};
use nalgebra::DMatrix;
use ndarray::Array2;
use tracing::debug;

/// Channel-name substrings marking scatter and time channels.
///
/// Matching is by substring so variants such as `FSC-A`, `SSC-H` or `Time-LSW` are caught.
pub const DEFAULT_SCATTER_PATTERNS: [&str; 5] = ["FSC", "SSC", "Time", "FS", "SS"];

/// Whether the event matrix has been through compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompensationState {
    /// Values as acquired.
    #[default]
    Raw,
    /// Spillover has been removed; compensation cannot be applied again.
    Compensated,
}

/// Indices of channels whose label contains none of `patterns`.
pub fn compensable_indices<S: AsRef<str>>(
    mappings: &[ChannelMapping],
    patterns: &[S],
) -> Vec<usize> {
    mappings
        .iter()
        .enumerate()
        .filter(|(_, m)| !patterns.iter().any(|p| m.channel.contains(p.as_ref())))
        .map(|(i, _)| i)
        .collect()
}

/// Apply the inverse spillover transform in place.
///
/// Scatter/time columns are left bit-identical; the solved values are written back to
/// exactly the compensable column indices.
pub fn compensate_events<S: AsRef<str>>(
    events: &mut Array2<f32>,
    mappings: &[ChannelMapping],
    spill: &SpilloverMatrix,
    patterns: &[S],
) -> AppResult<()> {
    let indices = compensable_indices(mappings, patterns);
    let n = spill.dimension();
    if indices.len() != n {
        return Err(CytoError::CompensationDimension {
            matrix: n,
            channels: indices.len(),
        });
    }

    let rows = events.nrows();
    if rows == 0 || n == 0 {
        return Ok(());
    }

    // Right-hand side: one column per event, one row per compensable channel.
    let rhs = DMatrix::<f64>::from_fn(n, rows, |channel, event| {
        f64::from(events[[event, indices[channel]]])
    });

    let solved = spill
        .values()
        .transpose()
        .lu()
        .solve(&rhs)
        .ok_or(CytoError::SingularSpillover)?;

    for (channel, &column) in indices.iter().enumerate() {
        for event in 0..rows {
            events[[event, column]] = solved[(channel, event)] as f32;
        }
    }

    debug!(events = rows, channels = n, "Applied spillover compensation");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn mappings(names: &[&str]) -> Vec<ChannelMapping> {
        names.iter().map(|n| ChannelMapping::new(n, "")).collect()
    }

    #[test]
    fn scatter_and_time_are_excluded_by_substring() {
        let m = mappings(&["FSC-A", "SSC-H", "FL1-A", "Time", "FS Lin", "PE-Cy7-A"]);
        assert_eq!(compensable_indices(&m, &DEFAULT_SCATTER_PATTERNS), vec![2, 5]);
    }

    #[test]
    fn solves_against_known_spillover() {
        // Raw = true · S, so compensation must recover `true`.
        let spill = SpilloverMatrix::new(
            vec!["FL1-A".into(), "FL2-A".into()],
            vec![1.0, 0.2, 0.1, 1.0],
        )
        .unwrap();
        let truth = [(100.0f64, 50.0f64), (10.0, 0.0)];
        let raw: Vec<f32> = truth
            .iter()
            .flat_map(|&(a, b)| {
                [
                    7.0f32,
                    (a * 1.0 + b * 0.1) as f32,
                    (a * 0.2 + b * 1.0) as f32,
                ]
            })
            .collect();
        let mut events = Array2::from_shape_vec((2, 3), raw).unwrap();

        compensate_events(
            &mut events,
            &mappings(&["SSC-A", "FL1-A", "FL2-A"]),
            &spill,
            &DEFAULT_SCATTER_PATTERNS,
        )
        .unwrap();

        assert_eq!(events[[0, 0]], 7.0);
        assert!((events[[0, 1]] - 100.0).abs() < 1e-3);
        assert!((events[[0, 2]] - 50.0).abs() < 1e-3);
        assert!((events[[1, 1]] - 10.0).abs() < 1e-3);
        assert!(events[[1, 2]].abs() < 1e-3);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let spill = SpilloverMatrix::new(vec!["FL1-A".into()], vec![1.0]).unwrap();
        let mut events = array![[1.0f32, 2.0, 3.0]];
        let err = compensate_events(
            &mut events,
            &mappings(&["FL1-A", "FL2-A", "FL3-A"]),
            &spill,
            &DEFAULT_SCATTER_PATTERNS,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CytoError::CompensationDimension {
                matrix: 1,
                channels: 3
            }
        ));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let spill =
            SpilloverMatrix::new(vec!["A".into(), "B".into()], vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut events = array![[1.0f32, 2.0]];
        let result = compensate_events(&mut events, &mappings(&["A", "B"]), &spill, &["FSC"]);
        assert!(matches!(result, Err(CytoError::SingularSpillover)));
        assert_eq!(events, array![[1.0f32, 2.0]]);
    }
}
