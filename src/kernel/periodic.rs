//! Periodic kernel
//!
//! K(x, y) = exp(-2 · sin²(π · ||x - y|| / τ) / σ²)
//!
//! The Gaussian RBF applied to a periodic transform of the distance: points a
//! whole number of periods τ apart are treated as identical.

use crate::bandwidth::{BandwidthFn, Heuristic};
use crate::core::{Kernel, Matrix, MatrixView, Result, ScaleValues};
use crate::distance::squared_pairwise_distance;
use crate::kernel::scale::{check_inference, mean_over_params, zip_params, ScaleParameter};
use crate::params::Parameter;
use std::f64::consts::PI;

const NAME: &str = "Periodic";

/// Periodic kernel with bandwidth σ and period τ
///
/// Each of σ and τ is fixed or seeded by its own heuristic (the median
/// heuristic unless configured otherwise).
#[derive(Debug, Clone)]
pub struct Periodic {
    tau: ScaleParameter,
    sigma: ScaleParameter,
    trainable: bool,
}

impl Periodic {
    /// Both σ and τ seeded by the median heuristic
    pub fn new() -> Self {
        Self {
            tau: ScaleParameter::seeded("tau", Heuristic::Median.function(), false),
            sigma: ScaleParameter::seeded("sigma", Heuristic::Median.function(), false),
            trainable: false,
        }
    }

    pub fn builder() -> PeriodicBuilder {
        PeriodicBuilder::default()
    }

    pub fn tau(&self) -> Option<ScaleValues> {
        self.tau.handle().values()
    }

    pub fn sigma(&self) -> Option<ScaleValues> {
        self.sigma.handle().values()
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }
}

impl Default for Periodic {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for Periodic {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        self.check_inference(infer_parameter)?;
        let dist = squared_pairwise_distance(x, y)?;
        self.tau.refresh(NAME, x, y, dist.view(), infer_parameter)?;
        self.sigma.refresh(NAME, x, y, dist.view(), infer_parameter)?;

        let (tau, sigma) = self.tau.values_with(NAME, &self.sigma)?;
        let pairs = zip_params(NAME, &tau, &sigma)?;
        mean_over_params(&dist, &pairs, |d, (tau, sigma)| {
            let s = (PI * d.sqrt() / tau).sin();
            (-2.0 * s * s / (sigma * sigma)).exp()
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![self.tau.handle().clone(), self.sigma.handle().clone()]
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        check_inference(NAME, "sigma", self.trainable, infer_parameter)
    }
}

/// Builder for [`Periodic`]
#[derive(Debug, Clone, Default)]
pub struct PeriodicBuilder {
    tau: Option<Vec<f64>>,
    init_tau_fn: Option<BandwidthFn>,
    sigma: Option<Vec<f64>>,
    init_sigma_fn: Option<BandwidthFn>,
    trainable: bool,
}

impl PeriodicBuilder {
    pub fn tau(mut self, tau: &[f64]) -> Self {
        self.tau = Some(tau.to_vec());
        self
    }

    pub fn init_tau_fn(mut self, init_fn: impl Into<BandwidthFn>) -> Self {
        self.init_tau_fn = Some(init_fn.into());
        self
    }

    pub fn sigma(mut self, sigma: &[f64]) -> Self {
        self.sigma = Some(sigma.to_vec());
        self
    }

    pub fn init_sigma_fn(mut self, init_fn: impl Into<BandwidthFn>) -> Self {
        self.init_sigma_fn = Some(init_fn.into());
        self
    }

    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    pub fn build(self) -> Result<Periodic> {
        let tau = ScaleParameter::from_options(
            "tau",
            self.tau.as_deref(),
            self.init_tau_fn.unwrap_or_else(|| Heuristic::Median.function()),
            self.trainable,
        )?;
        let sigma = ScaleParameter::from_options(
            "sigma",
            self.sigma.as_deref(),
            self.init_sigma_fn.unwrap_or_else(|| Heuristic::Median.function()),
            self.trainable,
        )?;
        if let (Some(t), Some(s)) = (tau.handle().values(), sigma.handle().values()) {
            zip_params(NAME, &t, &s)?;
        }
        Ok(Periodic {
            tau,
            sigma,
            trainable: self.trainable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelError;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn grid(n: usize, d: usize, seed: f64) -> Array2<f64> {
        Array2::from_shape_fn((n, d), |(i, j)| ((i * d + j) as f64 * seed).sin() * 3.0)
    }

    #[test]
    fn test_known_value() {
        let kernel = Periodic::builder().sigma(&[1.0]).tau(&[4.0]).build().unwrap();
        let x = array![[0.0]];
        let y = array![[1.0]];
        // sin(π/4)² = 0.5 -> exp(-1)
        let k = kernel.evaluate(x.view(), y.view(), false).unwrap();
        assert_relative_eq!(k[[0, 0]], (-1.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_whole_periods_look_identical() {
        let kernel = Periodic::builder().sigma(&[0.7]).tau(&[2.0]).build().unwrap();
        let x = array![[0.0, 0.0]];
        let y = array![[2.0, 0.0], [0.0, 4.0], [1.0, 0.0]];
        let k = kernel.evaluate(x.view(), y.view(), false).unwrap();
        assert_relative_eq!(k[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(k[[0, 1]], 1.0, epsilon = 1e-12);
        assert!(k[[0, 2]] < 1.0);
    }

    #[test]
    fn test_inferred_parameters_give_unit_diagonal() {
        let kernel = Periodic::new();
        let x = grid(12, 3, 0.61);
        let y = grid(9, 3, 1.7);

        let k_xy = kernel.evaluate(x.view(), y.view(), true).unwrap();
        let k_xx = kernel.evaluate(x.view(), x.view(), true).unwrap();
        assert_eq!(k_xy.dim(), (12, 9));
        assert_relative_eq!(k_xx.diag().sum(), 12.0, epsilon = 1e-10);
        assert!(k_xy.iter().all(|&v| v > 0.0));
        assert!(kernel.tau().is_some() && kernel.sigma().is_some());
    }

    #[test]
    fn test_independent_fixed_and_seeded_parameters() {
        let kernel = Periodic::builder().tau(&[8.0]).build().unwrap();
        assert_relative_eq!(kernel.tau().unwrap()[0], 8.0, epsilon = 1e-12);
        assert!(kernel.sigma().is_none());

        let x = grid(5, 2, 0.3);
        kernel.evaluate(x.view(), x.view(), true).unwrap();
        // τ was explicit and survives inference
        assert_relative_eq!(kernel.tau().unwrap()[0], 8.0, epsilon = 1e-12);
        assert!(kernel.sigma().is_some());
    }

    #[test]
    fn test_trainable_rejects_inference() {
        let kernel = Periodic::builder().trainable(true).build().unwrap();
        let x = grid(4, 2, 0.3);
        assert!(matches!(
            kernel.evaluate(x.view(), x.view(), true),
            Err(KernelError::InferenceConflict { kernel: "Periodic", .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(Periodic::builder().tau(&[-8.0]).build().is_err());
        assert!(Periodic::builder()
            .tau(&[1.0, 2.0])
            .sigma(&[1.0, 2.0, 3.0])
            .build()
            .is_err());
    }
}
