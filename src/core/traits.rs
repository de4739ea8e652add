//! Core traits for kernel evaluation

use crate::core::{Matrix, MatrixView, Result};
use crate::params::Parameter;

/// Kernel function trait
///
/// A kernel maps two batches `x` (N×D) and `y` (M×D) to the N×M matrix of
/// pairwise similarities `K[i, j] = k(x_i, y_j)`.
pub trait Kernel: Send + Sync {
    /// Compute the kernel matrix between `x` and `y`
    ///
    /// When `infer_parameter` is true, heuristic-seeded parameters are
    /// re-derived from `(x, y)` before evaluation. Trainable kernels reject
    /// the flag with [`KernelError::InferenceConflict`](crate::core::KernelError).
    fn evaluate(&self, x: MatrixView<'_>, y: MatrixView<'_>, infer_parameter: bool)
        -> Result<Matrix>;

    /// Short kernel name used in logs and errors
    fn name(&self) -> &'static str;

    /// Handles to every parameter of this kernel, children included
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Whether every parameter already holds a value
    fn is_initialized(&self) -> bool {
        self.parameters().iter().all(Parameter::is_initialized)
    }

    /// Fail if evaluating with `infer_parameter` would conflict with a
    /// trainable parameter anywhere in this kernel
    ///
    /// Runs before any parameter is touched, so a rejected call leaves every
    /// child kernel as it was.
    fn check_inference(&self, _infer_parameter: bool) -> Result<()> {
        Ok(())
    }
}

impl<K: Kernel + ?Sized> Kernel for Box<K> {
    fn evaluate(
        &self,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<Matrix> {
        (**self).evaluate(x, y, infer_parameter)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn parameters(&self) -> Vec<Parameter> {
        (**self).parameters()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn check_inference(&self, infer_parameter: bool) -> Result<()> {
        (**self).check_inference(infer_parameter)
    }
}

/// Feature projection applied before a deep kernel's inner kernel
///
/// Implementations map an N×D batch to an N×K batch. The mapping is opaque to
/// this crate; it only has to keep the number of rows.
pub trait Projection: Send + Sync {
    fn project(&self, x: MatrixView<'_>) -> Result<Matrix>;
}

impl<P: Projection + ?Sized> Projection for Box<P> {
    fn project(&self, x: MatrixView<'_>) -> Result<Matrix> {
        (**self).project(x)
    }
}
