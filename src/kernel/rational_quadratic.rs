//! Rational Quadratic kernel
//!
//! K(x, y) = (1 + ||x - y||² / (2ασ²))^(-α)
//!
//! A scale mixture of Gaussian RBF kernels with different length scales; α
//! weights large against small scales and the kernel tends to the Gaussian RBF
//! as α → ∞. Both α and σ are stored as exponentials of unconstrained values,
//! so an optimizer can never push them to zero or below.

use crate::bandwidth::{BandwidthFn, Heuristic};
use crate::core::{Kernel, Matrix, MatrixView, Result, ScaleValues};
use crate::distance::squared_pairwise_distance;
use crate::kernel::scale::{check_inference, mean_over_params, zip_params, ScaleParameter};
use crate::params::Parameter;

const NAME: &str = "RationalQuadratic";

/// Rational Quadratic kernel with bandwidth σ and shape α
///
/// σ and α are paired index by index; a single value on either side is
/// reused for every value on the other.
#[derive(Debug, Clone)]
pub struct RationalQuadratic {
    alpha: ScaleParameter,
    sigma: ScaleParameter,
    trainable: bool,
}

impl RationalQuadratic {
    /// α = 1 and a median-heuristic bandwidth
    pub fn new() -> Self {
        Self {
            alpha: ScaleParameter::unit("alpha", false),
            sigma: ScaleParameter::seeded("sigma", Heuristic::Median.function(), false),
            trainable: false,
        }
    }

    pub fn builder() -> RationalQuadraticBuilder {
        RationalQuadraticBuilder::default()
    }

    pub fn alpha(&self) -> Option<ScaleValues> {
        self.alpha.handle().values()
    }

    pub fn sigma(&self) -> Option<ScaleValues> {
        self.sigma.handle().values()
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }
}

impl Default for RationalQuadratic {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for RationalQuadratic {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        self.check_inference(infer_parameter)?;
        let dist = squared_pairwise_distance(x, y)?;
        self.alpha.refresh(NAME, x, y, dist.view(), infer_parameter)?;
        self.sigma.refresh(NAME, x, y, dist.view(), infer_parameter)?;

        let (alpha, sigma) = self.alpha.values_with(NAME, &self.sigma)?;
        let pairs = zip_params(NAME, &alpha, &sigma)?;
        mean_over_params(&dist, &pairs, |d, (alpha, sigma)| {
            (1.0 + d / (2.0 * alpha * sigma * sigma)).powf(-alpha)
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![self.alpha.handle().clone(), self.sigma.handle().clone()]
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        check_inference(NAME, "sigma", self.trainable, infer_parameter)
    }
}

/// Builder for [`RationalQuadratic`]
#[derive(Debug, Clone, Default)]
pub struct RationalQuadraticBuilder {
    alpha: Option<Vec<f64>>,
    init_alpha_fn: Option<BandwidthFn>,
    sigma: Option<Vec<f64>>,
    init_sigma_fn: Option<BandwidthFn>,
    trainable: bool,
}

impl RationalQuadraticBuilder {
    pub fn alpha(mut self, alpha: &[f64]) -> Self {
        self.alpha = Some(alpha.to_vec());
        self
    }

    /// Derive α from data instead of defaulting to 1; returns log(α)
    pub fn init_alpha_fn(mut self, init_fn: impl Into<BandwidthFn>) -> Self {
        self.init_alpha_fn = Some(init_fn.into());
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

    pub fn build(self) -> Result<RationalQuadratic> {
        let alpha = match (self.alpha, self.init_alpha_fn) {
            (Some(alpha), _) => ScaleParameter::explicit("alpha", &alpha, self.trainable)?,
            (None, Some(init_fn)) => ScaleParameter::seeded("alpha", init_fn, self.trainable),
            (None, None) => ScaleParameter::unit("alpha", self.trainable),
        };
        let sigma = ScaleParameter::from_options(
            "sigma",
            self.sigma.as_deref(),
            self.init_sigma_fn.unwrap_or_else(|| Heuristic::Median.function()),
            self.trainable,
        )?;
        if let (Some(a), Some(s)) = (alpha.handle().values(), sigma.handle().values()) {
            zip_params(NAME, &a, &s)?;
        }
        Ok(RationalQuadratic {
            alpha,
            sigma,
            trainable: self.trainable,
        })
    }
}
