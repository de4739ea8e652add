//! Composite kernels
//!
//! Kernels combined point-wise:
//! - Sum: K(x, y) = Σᵢ Kᵢ(x, y)
//! - Product: K(x, y) = Πᵢ Kᵢ(x, y)
//! - Scaled: K(x, y) = c · K'(x, y) or K'(x, y) / c
//!
//! Sums and products of positive semi-definite kernels are positive
//! semi-definite. No normalisation is applied: a sum of k kernels with unit
//! diagonal has diagonal k, and dividing by k is up to the caller.
//!
//! `infer_parameter` is forwarded to every child, so each child runs its own
//! heuristic on the same input pair. The whole tree is checked for trainable
//! children before the first child is evaluated.

use crate::core::{Kernel, KernelError, Matrix, MatrixView, Result};
use crate::params::Parameter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar applied to the output of a kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarOp {
    Multiply(f64),
    Divide(f64),
}

impl ScalarOp {
    fn validate(self) -> Result<Self> {
        match self {
            ScalarOp::Multiply(c) if !c.is_finite() => Err(KernelError::InvalidParameter(
                format!("cannot scale a kernel by {c}"),
            )),
            ScalarOp::Divide(c) if !c.is_finite() || c == 0.0 => Err(
                KernelError::InvalidParameter(format!("cannot divide a kernel by {c}")),
            ),
            op => Ok(op),
        }
    }

    fn apply(self, value: f64) -> f64 {
        match self {
            ScalarOp::Multiply(c) => value * c,
            ScalarOp::Divide(c) => value / c,
        }
    }
}

/// Kernel built from other kernels
///
/// The tree shape is fixed at construction; only the parameters of the leaf
/// kernels change afterwards.
pub enum CompositeKernel {
    Sum(Vec<Box<dyn Kernel>>),
    Product(Vec<Box<dyn Kernel>>),
    Scaled {
        kernel: Box<dyn Kernel>,
        op: ScalarOp,
    },
}

/// Point-wise sum of kernels
pub fn sum_kernels(kernels: Vec<Box<dyn Kernel>>) -> Result<CompositeKernel> {
    require_children("sum", &kernels)?;
    Ok(CompositeKernel::Sum(kernels))
}

/// Point-wise product of kernels
///
/// # Examples
/// ```
/// use drift_kernels::kernel::{product_kernels, GaussianRBF, Kernel};
/// use ndarray::array;
///
/// let kernel = product_kernels(vec![
///     Box::new(GaussianRBF::with_sigma(&[1.0]).unwrap()),
///     Box::new(GaussianRBF::with_sigma(&[2.0]).unwrap()),
/// ])
/// .unwrap();
/// let x = array![[0.0, 1.0], [1.0, 0.0]];
/// let k = kernel.evaluate(x.view(), x.view(), false).unwrap();
/// assert_eq!(k[[0, 0]], 1.0);
/// ```
pub fn product_kernels(kernels: Vec<Box<dyn Kernel>>) -> Result<CompositeKernel> {
    require_children("product", &kernels)?;
    Ok(CompositeKernel::Product(kernels))
}

/// Multiply the output of a kernel by a constant
pub fn scale_kernel<K: Kernel + 'static>(kernel: K, factor: f64) -> Result<CompositeKernel> {
    Ok(CompositeKernel::Scaled {
        kernel: Box::new(kernel),
        op: ScalarOp::Multiply(factor).validate()?,
    })
}

/// Divide the output of a kernel by a non-zero constant
pub fn divide_kernel<K: Kernel + 'static>(kernel: K, divisor: f64) -> Result<CompositeKernel> {
    Ok(CompositeKernel::Scaled {
        kernel: Box::new(kernel),
        op: ScalarOp::Divide(divisor).validate()?,
    })
}

fn require_children(op: &str, kernels: &[Box<dyn Kernel>]) -> Result<()> {
    if kernels.is_empty() {
        return Err(KernelError::InvalidParameter(format!(
            "a kernel {op} needs at least one kernel"
        )));
    }
    Ok(())
}

impl CompositeKernel {
    /// Child kernels in evaluation order
    pub fn children(&self) -> Vec<&dyn Kernel> {
        match self {
            CompositeKernel::Sum(kernels) | CompositeKernel::Product(kernels) => {
                kernels.iter().map(|k| &**k).collect()
            }
            CompositeKernel::Scaled { kernel, .. } => vec![&**kernel],
        }
    }

    fn fold(
        kernels: &[Box<dyn Kernel>],
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
        combine: impl Fn(&mut f64, f64),
    ) -> Result<Matrix> {
        let mut acc: Option<Matrix> = None;
        for kernel in kernels {
            let k = kernel.evaluate(x, y, infer_parameter)?;
            acc = Some(match acc {
                None => k,
                Some(mut acc) => {
                    if acc.dim() != k.dim() {
                        return Err(KernelError::ShapeMismatch(format!(
                            "{} returned {:?}, expected {:?}",
                            kernel.name(),
                            k.dim(),
                            acc.dim()
                        )));
                    }
                    acc.zip_mut_with(&k, |a, &b| combine(a, b));
                    acc
                }
            });
        }
        acc.ok_or_else(|| {
            KernelError::InvalidParameter("composite kernel has no children".to_string())
        })
    }
}

impl Kernel for CompositeKernel {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        self.check_inference(infer_parameter)?;
        match self {
            CompositeKernel::Sum(kernels) => {
                Self::fold(kernels, x, y, infer_parameter, |a, b| *a += b)
            }
            CompositeKernel::Product(kernels) => {
                Self::fold(kernels, x, y, infer_parameter, |a, b| *a *= b)
            }
            CompositeKernel::Scaled { kernel, op } => {
                let mut k = kernel.evaluate(x, y, infer_parameter)?;
                k.mapv_inplace(|v| op.apply(v));
                Ok(k)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CompositeKernel::Sum(_) => "Sum",
            CompositeKernel::Product(_) => "Product",
            CompositeKernel::Scaled { .. } => "Scaled",
        }
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.children()
            .into_iter()
            .flat_map(|k| k.parameters())
            .collect()
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        self.children()
            .into_iter()
            .try_for_each(|k| k.check_inference(infer_parameter))
    }
}

impl fmt::Debug for CompositeKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeKernel::Sum(kernels) | CompositeKernel::Product(kernels) => f
                .debug_tuple(self.name())
                .field(&kernels.iter().map(|k| k.name()).collect::<Vec<_>>())
                .finish(),
            CompositeKernel::Scaled { kernel, op } => f
                .debug_struct("Scaled")
                .field("kernel", &kernel.name())
                .field("op", op)
                .finish(),
        }
    }
}
