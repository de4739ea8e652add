//! Deep kernel
//!
//! K(x, y) = ε · K_a(φ(x), φ(y)) + (1 - ε) · K_b(x, y)
//!
//! φ is an externally supplied projection (usually a trained network), K_a a
//! kernel on the projected features and K_b a kernel on the raw features.
//! Keeping a small raw-space term stops the learned kernel from collapsing
//! onto the projection alone. ε is either a constant in [0, 1] or learned as
//! sigmoid(logit), which keeps it strictly inside (0, 1).

use crate::core::{Eps, Kernel, KernelError, Matrix, MatrixView, Projection, Result};
use crate::distance::validate_batches;
use crate::kernel::GaussianRBF;
use crate::params::{Constraint, Parameter};
use ndarray::{array, Array1, Array2};

const NAME: &str = "DeepKernel";

/// Affine projection φ(x) = x·W + b
///
/// A minimal [`Projection`] for a single linear layer; real networks implement
/// the trait themselves.
#[derive(Debug, Clone)]
pub struct LinearProjection {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearProjection {
    /// `weights` is D×K, `bias` has length K
    pub fn new(weights: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        if bias.len() != weights.ncols() {
            return Err(KernelError::DimensionMismatch {
                expected: weights.ncols(),
                actual: bias.len(),
            });
        }
        if weights.iter().chain(bias.iter()).any(|v| !v.is_finite()) {
            return Err(KernelError::InvalidParameter(
                "projection weights must be finite".to_string(),
            ));
        }
        Ok(Self { weights, bias })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }
}

impl Projection for LinearProjection {
    fn project(&self, x: MatrixView<'_>) -> Result<Matrix> {
        if x.ncols() != self.input_dim() {
            return Err(KernelError::DimensionMismatch {
                expected: self.input_dim(),
                actual: x.ncols(),
            });
        }
        Ok(x.dot(&self.weights) + &self.bias)
    }
}

/// Projection backed by a function
pub struct FnProjection<F>(F);

/// Wrap a function as a [`Projection`]
pub fn projection_fn<F>(f: F) -> FnProjection<F>
where
    F: Fn(MatrixView<'_>) -> Result<Matrix> + Send + Sync,
{
    FnProjection(f)
}

impl<F> Projection for FnProjection<F>
where
    F: Fn(MatrixView<'_>) -> Result<Matrix> + Send + Sync,
{
    fn project(&self, x: MatrixView<'_>) -> Result<Matrix> {
        (self.0)(x)
    }
}

#[derive(Debug, Clone)]
enum MixingWeight {
    Fixed(f64),
    Trainable(Parameter),
}

/// Projection kernel blended with a raw-space kernel
pub struct DeepKernel {
    projection: Box<dyn Projection>,
    kernel_a: Box<dyn Kernel>,
    kernel_b: Option<Box<dyn Kernel>>,
    eps: MixingWeight,
    infer_raw_bandwidth: bool,
}

impl DeepKernel {
    /// Deep kernel with a trainable ε and a median-heuristic Gaussian RBF on
    /// the raw features
    pub fn new<P, K>(projection: P, kernel_a: K) -> Result<Self>
    where
        P: Projection + 'static,
        K: Kernel + 'static,
    {
        Self::builder(projection, kernel_a).build()
    }

    pub fn builder<P, K>(projection: P, kernel_a: K) -> DeepKernelBuilder
    where
        P: Projection + 'static,
        K: Kernel + 'static,
    {
        DeepKernelBuilder {
            projection: Box::new(projection),
            kernel_a: Box::new(kernel_a),
            kernel_b: RawKernel::Default,
            eps: Eps::Trainable,
            infer_raw_bandwidth: false,
        }
    }

    /// Current mixing weight ε
    pub fn eps(&self) -> f64 {
        match &self.eps {
            MixingWeight::Fixed(eps) => *eps,
            // sigmoid rounds to 0 or 1 for large |logit|
            MixingWeight::Trainable(logit) => logit
                .values()
                .map_or(0.5, |v| v[0])
                .clamp(f64::EPSILON, 1.0 - f64::EPSILON),
        }
    }

    pub fn kernel_a(&self) -> &dyn Kernel {
        &*self.kernel_a
    }

    pub fn kernel_b(&self) -> Option<&dyn Kernel> {
        self.kernel_b.as_deref()
    }

    /// Project a batch, checking that no rows were added or dropped
    pub fn project(&self, x: MatrixView<'_>) -> Result<Matrix> {
        let projected = self.projection.project(x)?;
        if projected.nrows() != x.nrows() {
            return Err(KernelError::ShapeMismatch(format!(
                "projection mapped {} rows to {}",
                x.nrows(),
                projected.nrows()
            )));
        }
        Ok(projected)
    }
}

impl Kernel for DeepKernel {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        validate_batches(x, y)?;
        self.check_inference(infer_parameter)?;
        let eps = self.eps();

        let x_proj = self.project(x)?;
        let y_proj = self.project(y)?;
        let mut similarity = self
            .kernel_a
            .evaluate(x_proj.view(), y_proj.view(), false)?;

        let Some(kernel_b) = &self.kernel_b else {
            return Ok(similarity);
        };
        let raw = kernel_b.evaluate(x, y, infer_parameter && self.infer_raw_bandwidth)?;
        if raw.dim() != similarity.dim() {
            return Err(KernelError::ShapeMismatch(format!(
                "{} returned {:?}, projected kernel returned {:?}",
                kernel_b.name(),
                raw.dim(),
                similarity.dim()
            )));
        }
        similarity.zip_mut_with(&raw, |a, &b| *a = eps * *a + (1.0 - eps) * b);
        Ok(similarity)
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params = self.kernel_a.parameters();
        if let Some(kernel_b) = &self.kernel_b {
            params.extend(kernel_b.parameters());
        }
        if let MixingWeight::Trainable(logit) = &self.eps {
            params.push(logit.clone());
        }
        params
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        match &self.kernel_b {
            Some(kernel_b) => kernel_b.check_inference(infer_parameter && self.infer_raw_bandwidth),
            None => Ok(()),
        }
    }
}

enum RawKernel {
    Default,
    Custom(Box<dyn Kernel>),
    Disabled,
}

/// Builder for [`DeepKernel`]
pub struct DeepKernelBuilder {
    projection: Box<dyn Projection>,
    kernel_a: Box<dyn Kernel>,
    kernel_b: RawKernel,
    eps: Eps,
    infer_raw_bandwidth: bool,
}

impl DeepKernelBuilder {
    /// Kernel on the raw features (a median-heuristic Gaussian RBF otherwise)
    pub fn kernel_b<K: Kernel + 'static>(mut self, kernel: K) -> Self {
        self.kernel_b = RawKernel::Custom(Box::new(kernel));
        self
    }

    /// Use the projected kernel alone (ε = 1)
    pub fn without_raw_kernel(mut self) -> Self {
        self.kernel_b = RawKernel::Disabled;
        self
    }

    pub fn eps(mut self, eps: impl Into<Eps>) -> Self {
        self.eps = eps.into();
        self
    }

    /// Forward `infer_parameter` to the raw-space kernel
    pub fn infer_raw_bandwidth(mut self, enabled: bool) -> Self {
        self.infer_raw_bandwidth = enabled;
        self
    }

    pub fn build(self) -> Result<DeepKernel> {
        let kernel_b: Option<Box<dyn Kernel>> = match self.kernel_b {
            RawKernel::Default => Some(Box::new(GaussianRBF::new())),
            RawKernel::Custom(kernel) => Some(kernel),
            RawKernel::Disabled => None,
        };

        let eps = match (kernel_b.is_some(), self.eps) {
            (false, _) => MixingWeight::Fixed(1.0),
            (true, Eps::Fixed(eps)) => {
                if !(0.0..=1.0).contains(&eps) {
                    return Err(KernelError::InvalidParameter(format!(
                        "eps must lie in [0, 1], got {eps}"
                    )));
                }
                MixingWeight::Fixed(eps)
            }
            (true, Eps::Trainable) => MixingWeight::Trainable(Parameter::with_raw(
                "eps",
                Constraint::UnitInterval,
                true,
                array![0.0],
            )?),
        };

        Ok(DeepKernel {
            projection: self.projection,
            kernel_a: self.kernel_a,
            kernel_b,
            eps,
            infer_raw_bandwidth: self.infer_raw_bandwidth,
        })
    }
}
