//! Gaussian RBF (Radial Basis Function) kernel
//!
//! The Gaussian RBF kernel is defined as: K(x, y) = exp(-||x - y||² / (2σ²))
//! where σ (sigma) is the bandwidth that controls how quickly similarity
//! decays with distance.
//!
//! With several bandwidths σ₁..σₖ the kernel is the mean of the k single-bandwidth
//! kernels, so the value stays in (0, 1] and equals 1 wherever x = y.

use crate::bandwidth::{BandwidthFn, Heuristic};
use crate::core::{Kernel, Matrix, MatrixView, Result, ScaleValues};
use crate::distance::squared_pairwise_distance;
use crate::kernel::scale::{check_inference, mean_over_params, ScaleParameter};
use crate::params::Parameter;

const NAME: &str = "GaussianRBF";

/// Gaussian RBF kernel: K(x, y) = exp(-||x - y||² / (2σ²))
///
/// The bandwidth σ is either given explicitly or inferred from the data with a
/// bandwidth heuristic (the median heuristic by default):
/// - Small σ: only very close points are similar
/// - Large σ: distant points keep a high similarity
///
/// Clones share the bandwidth cell with the original.
#[derive(Debug, Clone)]
pub struct GaussianRBF {
    sigma: ScaleParameter,
    trainable: bool,
}

impl GaussianRBF {
    /// Create a kernel whose bandwidth is inferred with the median heuristic
    pub fn new() -> Self {
        Self {
            sigma: ScaleParameter::seeded("sigma", Heuristic::Median.function(), false),
            trainable: false,
        }
    }

    /// Create a kernel with fixed bandwidth(s)
    ///
    /// # Examples
    /// ```
    /// use drift_kernels::kernel::GaussianRBF;
    ///
    /// let kernel = GaussianRBF::with_sigma(&[1.0, 2.0]).unwrap();
    /// assert_eq!(kernel.sigma().unwrap().len(), 2);
    /// ```
    pub fn with_sigma(sigma: &[f64]) -> Result<Self> {
        Self::builder().sigma(sigma).build()
    }

    pub fn builder() -> GaussianRBFBuilder {
        GaussianRBFBuilder::default()
    }

    /// Current bandwidth values, `None` until inferred
    pub fn sigma(&self) -> Option<ScaleValues> {
        self.sigma.handle().values()
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }
}

impl Default for GaussianRBF {
    /// Median-heuristic bandwidth, not trainable
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for GaussianRBF {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        self.check_inference(infer_parameter)?;
        let dist = squared_pairwise_distance(x, y)?;
        self.sigma.refresh(NAME, x, y, dist.view(), infer_parameter)?;

        let sigma = self.sigma.values(NAME)?;
        let gammas: Vec<f64> = sigma.iter().map(|s| 1.0 / (2.0 * s * s)).collect();
        mean_over_params(&dist, &gammas, |d, gamma| (-gamma * d).exp())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![self.sigma.handle().clone()]
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        check_inference(NAME, "sigma", self.trainable, infer_parameter)
    }
}

/// Builder for [`GaussianRBF`]
#[derive(Debug, Clone, Default)]
pub struct GaussianRBFBuilder {
    sigma: Option<Vec<f64>>,
    init_sigma_fn: Option<BandwidthFn>,
    trainable: bool,
}

impl GaussianRBFBuilder {
    /// Fix the bandwidth(s); values must be positive
    pub fn sigma(mut self, sigma: &[f64]) -> Self {
        self.sigma = Some(sigma.to_vec());
        self
    }

    /// Heuristic used when no bandwidth is given, returning log(σ)
    pub fn init_sigma_fn(mut self, init_fn: impl Into<BandwidthFn>) -> Self {
        self.init_sigma_fn = Some(init_fn.into());
        self
    }

    /// Mark the bandwidth as updated by an external optimizer
    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    pub fn build(self) -> Result<GaussianRBF> {
        let init_fn = self.init_sigma_fn.unwrap_or_else(|| Heuristic::Median.function());
        Ok(GaussianRBF {
            sigma: ScaleParameter::from_options(
                "sigma",
                self.sigma.as_deref(),
                init_fn,
                self.trainable,
            )?,
            trainable: self.trainable,
        })
    }
}
