use std::fmt::{self, Display};

use itertools::Itertools;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

const EDGE_TOLERANCE: f64 = 1e-10;

/// Strictly increasing bin edges along one histogram axis
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Binning {
    edges: Vec<f64>,
}

impl Binning {
    /// Bin edges from a sequence of values
    pub fn new(edges: Vec<f64>) -> Result<Self, BinningError> {
        use BinningError::*;
        if edges.len() < 2 {
            return Err(TooFewEdges(edges.len()));
        }
        if let Some(pos) = edges.iter().position(|e| !e.is_finite()) {
            return Err(NonFinite(pos));
        }
        if let Some(pos) = edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(NotIncreasing(pos + 1));
        }
        Ok(Self { edges })
    }

    /// Bin edges from an array that has to be one-dimensional
    pub fn from_array(edges: ArrayD<f64>) -> Result<Self, BinningError> {
        if edges.ndim() != 1 {
            return Err(BinningError::Shape(edges.shape().to_vec()));
        }
        Self::new(edges.iter().copied().collect())
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins, i.e. number of edges minus one
    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Index of the bin containing `x`
    ///
    /// All bins are half-open `[lo, hi)`, except for the last one,
    /// which also includes its upper edge. Values outside the range
    /// and NaN are not in any bin.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(self.min()..=self.max()).contains(&x) {
            return None;
        }
        let pos = self.edges.partition_point(|&e| e <= x);
        Some(std::cmp::min(pos, self.edges.len() - 1) - 1)
    }

    /// Arithmetic bin centres
    pub fn centres(&self) -> Vec<f64> {
        self.edges
            .iter()
            .tuple_windows()
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    /// Whether two binnings have the same edges up to rounding errors
    pub fn is_equal(&self, other: &Binning) -> bool {
        self.edges.len() == other.edges.len()
            && self.edges.iter().zip(&other.edges).all(|(a, b)| {
                (a - b).abs() <= EDGE_TOLERANCE * (1. + a.abs().max(b.abs()))
            })
    }

    /// Check that `other` has the same edges as `self` along `axis`
    pub fn check_equal(
        &self,
        other: &Binning,
        axis: Axis,
    ) -> Result<(), BinningMismatch> {
        if self.is_equal(other) {
            Ok(())
        } else {
            Err(BinningMismatch {
                axis,
                expected: self.clone(),
                found: other.clone(),
            })
        }
    }
}

impl TryFrom<Vec<f64>> for Binning {
    type Error = BinningError;

    fn try_from(edges: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(edges)
    }
}

impl From<Binning> for Vec<f64> {
    fn from(b: Binning) -> Self {
        b.edges
    }
}

impl Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.edges)
    }
}

/// Histogram axes
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Axis {
    #[strum(serialize = "energy")]
    Energy,
    #[strum(serialize = "cos(zenith)")]
    Coszen,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BinningError {
    #[error("Bin edges must be one-dimensional, got shape {0:?}")]
    Shape(Vec<usize>),
    #[error("At least two bin edges are required, got {0}")]
    TooFewEdges(usize),
    #[error("Bin edge {0} is not finite")]
    NonFinite(usize),
    #[error("Bin edges are not strictly increasing at position {0}")]
    NotIncreasing(usize),
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("Mismatched {axis} binning: expected {expected}, found {found}")]
pub struct BinningMismatch {
    pub axis: Axis,
    pub expected: Binning,
    pub found: Binning,
}
