//! Bandwidth heuristics
//!
//! A heuristic derives scale parameter values from the data a kernel is about
//! to be evaluated on. Every heuristic has the same shape,
//! `(x, y, squared_distances) -> log(values)`: values are returned on the log
//! scale because kernels store positive parameters as the exponential of an
//! unconstrained value.
//!
//! The default is the median heuristic:
//!
//! σ = sqrt(0.5 · median(nonzero entries of S))
//!
//! Zero entries are dropped before taking the median. This removes the
//! self-distances on the diagonal when `x` and `y` are the same batch, which
//! would otherwise pull the bandwidth towards zero.

use crate::core::{KernelError, MatrixView, Result, ScaleValues};
use log::warn;
use ndarray::array;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared heuristic callable: `(x, y, squared_distances) -> log(values)`
#[derive(Clone)]
pub struct BandwidthFn(
    Arc<dyn Fn(MatrixView<'_>, MatrixView<'_>, MatrixView<'_>) -> Result<ScaleValues> + Send + Sync>,
);

impl BandwidthFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(MatrixView<'_>, MatrixView<'_>, MatrixView<'_>) -> Result<ScaleValues>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the heuristic, returning log-scale values
    pub fn call(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        dist: MatrixView<'_>,
    ) -> Result<ScaleValues> {
        (self.0)(x, y, dist)
    }
}

impl fmt::Debug for BandwidthFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BandwidthFn(..)")
    }
}

/// Named heuristics, selectable from configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    /// sqrt(0.5 · median of nonzero squared distances)
    #[default]
    Median,
    /// sqrt(0.5 · mean of nonzero squared distances)
    Mean,
}

impl Heuristic {
    pub fn function(self) -> BandwidthFn {
        match self {
            Heuristic::Median => BandwidthFn::new(log_sigma_median),
            Heuristic::Mean => BandwidthFn::new(log_sigma_mean),
        }
    }
}

impl From<Heuristic> for BandwidthFn {
    fn from(heuristic: Heuristic) -> Self {
        heuristic.function()
    }
}

/// Median heuristic on the linear scale
pub fn sigma_median(
    _x: MatrixView<'_>,
    _y: MatrixView<'_>,
    dist: MatrixView<'_>,
) -> Result<ScaleValues> {
    let mut values = nonzero_distances(dist)?;
    // Upper middle element for an even count
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    Ok(array![(0.5 * *median).sqrt()])
}

/// Median heuristic on the log scale
pub fn log_sigma_median(
    x: MatrixView<'_>,
    y: MatrixView<'_>,
    dist: MatrixView<'_>,
) -> Result<ScaleValues> {
    Ok(sigma_median(x, y, dist)?.mapv(f64::ln))
}

/// Mean heuristic on the log scale
pub fn log_sigma_mean(
    _x: MatrixView<'_>,
    _y: MatrixView<'_>,
    dist: MatrixView<'_>,
) -> Result<ScaleValues> {
    let values = nonzero_distances(dist)?;
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(array![(0.5 * mean).sqrt().ln()])
}

fn nonzero_distances(dist: MatrixView<'_>) -> Result<Vec<f64>> {
    let values: Vec<f64> = dist.iter().copied().filter(|&d| d > 0.0).collect();
    if values.is_empty() {
        return Err(KernelError::DegenerateInput(format!(
            "all {} pairwise distances are zero",
            dist.len()
        )));
    }
    if values.len() * 2 < dist.len() {
        warn!(
            "only {} of {} pairwise distances are nonzero; duplicated samples bias the bandwidth",
            values.len(),
            dist.len()
        );
    }
    Ok(values)
}
