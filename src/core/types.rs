//! Core type definitions for kernel evaluation

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Dense row-major batch of vectors or kernel values (rows are samples)
pub type Matrix = Array2<f64>;

/// Borrowed view of a batch
pub type MatrixView<'a> = ArrayView2<'a, f64>;

/// Ordered set of scale parameter values (one entry per bandwidth)
pub type ScaleValues = Array1<f64>;

/// Mixing weight between the projected-space and raw-space kernels of a deep kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eps {
    /// Constant weight in [0, 1]
    Fixed(f64),
    /// Learned weight, kept in (0, 1) by a logistic map
    Trainable,
}

impl Default for Eps {
    fn default() -> Self {
        Self::Trainable
    }
}

impl From<f64> for Eps {
    fn from(value: f64) -> Self {
        Self::Fixed(value)
    }
}

/// Logistic function, maps the real line onto (0, 1)
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`sigmoid`]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
