//! # Censoring Partitioner
//!
//! Splits a design matrix and response vector into the three groups the
//! censored likelihood treats differently: left-censored, uncensored and
//! right-censored observations.
//!
//! A group with no rows is represented as `None` rather than as a zero-row
//! matrix. The likelihood and gradient evaluators match on the `Option` and
//! skip the whole term, so no empty reduction is ever formed.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Censoring status of a single observation.
///
/// The storage form is the integer code used in data files: `-1` for left
/// censoring, `0` for an exactly observed response, `1` for right censoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CensoringCode {
    /// The response is only known to be at or below the recorded value.
    Left,
    /// The response is observed exactly.
    Uncensored,
    /// The response is only known to be at or above the recorded value.
    Right,
}

impl CensoringCode {
    pub fn is_censored(self) -> bool {
        !matches!(self, CensoringCode::Uncensored)
    }

    /// The code an observation carries after the response is negated.
    pub fn mirrored(self) -> Self {
        match self {
            CensoringCode::Left => CensoringCode::Right,
            CensoringCode::Uncensored => CensoringCode::Uncensored,
            CensoringCode::Right => CensoringCode::Left,
        }
    }
}

impl TryFrom<i64> for CensoringCode {
    type Error = PartitionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(CensoringCode::Left),
            0 => Ok(CensoringCode::Uncensored),
            1 => Ok(CensoringCode::Right),
            other => Err(PartitionError::InvalidCode(other)),
        }
    }
}

impl fmt::Display for CensoringCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CensoringCode::Left => "left",
            CensoringCode::Uncensored => "none",
            CensoringCode::Right => "right",
        };
        write!(f, "{label}")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("Invalid censoring code {0}. Codes must be -1 (left), 0 (none) or 1 (right).")]
    InvalidCode(i64),

    #[error(
        "Input lengths disagree: the design matrix has {rows} rows, the response has {responses} entries and {codes} censoring codes were given."
    )]
    LengthMismatch {
        rows: usize,
        responses: usize,
        codes: usize,
    },
}

/// The rows of the design matrix and response that share one censoring status.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationGroup {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl ObservationGroup {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Always false for a group produced by [`partition`].
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Observation counts by censoring status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservationCounts {
    pub total: usize,
    pub left: usize,
    pub uncensored: usize,
    pub right: usize,
}

impl ObservationCounts {
    pub fn censored(&self) -> usize {
        self.left + self.right
    }
}

/// The three disjoint observation groups. Empty groups are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CensoredGroups {
    pub left: Option<ObservationGroup>,
    pub mid: Option<ObservationGroup>,
    pub right: Option<ObservationGroup>,
}

impl CensoredGroups {
    pub fn counts(&self) -> ObservationCounts {
        let size = |group: &Option<ObservationGroup>| group.as_ref().map_or(0, |g| g.len());
        let left = size(&self.left);
        let uncensored = size(&self.mid);
        let right = size(&self.right);
        ObservationCounts {
            total: left + uncensored + right,
            left,
            uncensored,
            right,
        }
    }

    /// Number of columns in the design, taken from whichever group is present.
    pub fn num_features(&self) -> Option<usize> {
        [&self.left, &self.mid, &self.right]
            .into_iter()
            .flatten()
            .map(|group| group.x.ncols())
            .next()
    }
}

/// Splits the observations into left-censored, uncensored and right-censored groups.
///
/// Row order inside each group follows the order of the matching rows in the
/// input. A warning is logged when nothing is censored: the estimator still
/// works, but ordinary least squares would give the same answer.
pub fn partition(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    codes: &[CensoringCode],
) -> Result<CensoredGroups, PartitionError> {
    if x.nrows() != y.len() || y.len() != codes.len() {
        return Err(PartitionError::LengthMismatch {
            rows: x.nrows(),
            responses: y.len(),
            codes: codes.len(),
        });
    }

    let select = |wanted: CensoringCode| -> Option<ObservationGroup> {
        let rows: Vec<usize> = codes
            .iter()
            .enumerate()
            .filter(|&(_, &code)| code == wanted)
            .map(|(row, _)| row)
            .collect();
        if rows.is_empty() {
            return None;
        }
        Some(ObservationGroup {
            x: x.select(Axis(0), &rows),
            y: y.select(Axis(0), &rows),
        })
    };

    let groups = CensoredGroups {
        left: select(CensoringCode::Left),
        mid: select(CensoringCode::Uncensored),
        right: select(CensoringCode::Right),
    };

    let counts = groups.counts();
    if !codes.iter().any(|code| code.is_censored()) {
        log::warn!(
            "No censored observations among {} rows; ordinary least squares would suffice.",
            counts.total
        );
    }
    log::debug!(
        "Partitioned {} observations: {} left-censored, {} uncensored, {} right-censored.",
        counts.total,
        counts.left,
        counts.uncensored,
        counts.right
    );

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn groups_preserve_row_order_and_pairing() {
        let x = array![[1.0, 10.0], [1.0, 20.0], [1.0, 30.0], [1.0, 40.0], [1.0, 50.0]];
        let y = array![0.1, 0.2, 0.3, 0.4, 0.5];
        let codes = [
            CensoringCode::Uncensored,
            CensoringCode::Left,
            CensoringCode::Uncensored,
            CensoringCode::Right,
            CensoringCode::Left,
        ];

        let groups = partition(x.view(), y.view(), &codes).unwrap();

        let left = groups.left.as_ref().unwrap();
        assert_eq!(left.y, array![0.2, 0.5]);
        assert_eq!(left.x, array![[1.0, 20.0], [1.0, 50.0]]);

        let mid = groups.mid.as_ref().unwrap();
        assert_eq!(mid.y, array![0.1, 0.3]);
        assert_eq!(mid.x.column(1), array![10.0, 30.0]);

        let right = groups.right.as_ref().unwrap();
        assert_eq!(right.y, array![0.4]);
        assert_eq!(right.x, array![[1.0, 40.0]]);
    }

    #[test]
    fn empty_groups_are_absent() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let codes = [CensoringCode::Uncensored; 3];

        let groups = partition(x.view(), y.view(), &codes).unwrap();
        assert!(groups.left.is_none());
        assert!(groups.right.is_none());
        assert_eq!(groups.mid.as_ref().map(ObservationGroup::len), Some(3));
        assert_eq!(groups.num_features(), Some(1));
    }

    #[test]
    fn every_row_lands_in_exactly_one_group() {
        let mut rng = StdRng::seed_from_u64(7);
        for trial in 0..20 {
            let n = 1 + trial * 3;
            // Encode the row index in the response so membership can be traced.
            let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
            let y = Array1::from_shape_fn(n, |i| i as f64);
            let codes: Vec<CensoringCode> = (0..n)
                .map(|_| match rng.gen_range(-1..=1) {
                    -1 => CensoringCode::Left,
                    0 => CensoringCode::Uncensored,
                    _ => CensoringCode::Right,
                })
                .collect();

            let groups = partition(x.view(), y.view(), &codes).unwrap();
            assert_eq!(groups.counts().total, n);

            let mut seen = HashSet::new();
            for (group, expected) in [
                (&groups.left, CensoringCode::Left),
                (&groups.mid, CensoringCode::Uncensored),
                (&groups.right, CensoringCode::Right),
            ] {
                if let Some(group) = group {
                    assert!(!group.is_empty());
                    for &row in group.y.iter() {
                        let row = row as usize;
                        assert_eq!(codes[row], expected);
                        assert!(seen.insert(row), "row {row} appears twice");
                    }
                }
            }
            assert_eq!(seen.len(), n);
        }
    }

    #[test]
    fn integer_codes_outside_the_domain_are_rejected() {
        assert_eq!(CensoringCode::try_from(-1), Ok(CensoringCode::Left));
        assert_eq!(CensoringCode::try_from(0), Ok(CensoringCode::Uncensored));
        assert_eq!(CensoringCode::try_from(1), Ok(CensoringCode::Right));
        assert_eq!(
            CensoringCode::try_from(2),
            Err(PartitionError::InvalidCode(2))
        );
        assert_eq!(
            CensoringCode::try_from(-3),
            Err(PartitionError::InvalidCode(-3))
        );
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        let err = partition(x.view(), y.view(), &[CensoringCode::Left]).unwrap_err();
        assert_eq!(
            err,
            PartitionError::LengthMismatch {
                rows: 2,
                responses: 2,
                codes: 1
            }
        );
    }

    #[test]
    fn mirrored_codes_swap_sides() {
        for code in [CensoringCode::Left, CensoringCode::Uncensored, CensoringCode::Right] {
            assert_eq!(code.mirrored().mirrored(), code);
            assert_eq!(code.mirrored().is_censored(), code.is_censored());
        }
        assert_eq!(CensoringCode::Left.mirrored(), CensoringCode::Right);
        assert_eq!(CensoringCode::Uncensored.to_string(), "none");
    }
}
