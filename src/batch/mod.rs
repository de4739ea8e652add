//! Batched kernel matrix assembly
//!
//! Reference sets in drift detection often hold tens of thousands of
//! instances. Evaluating a kernel on all of `x` at once would allocate several
//! N×M intermediates (distances, per-bandwidth kernels). The driver here
//! evaluates the kernel on contiguous row blocks of `x` against the whole of
//! `y`, so no intermediate grows beyond B×M, and writes each block into its
//! rows of the output.

use crate::config::BatchConfig;
use crate::core::{Kernel, KernelError, Matrix, MatrixView, Result};
use crate::distance::validate_batches;
use log::{debug, trace};
use ndarray::{s, Axis};
use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Function applied to every batch before the kernel sees it
pub type PreprocessFn = Box<dyn Fn(MatrixView<'_>) -> Result<Matrix> + Send + Sync>;

/// Row-blocked kernel matrix driver
pub struct BatchedKernelMatrix {
    block_size: usize,
    preprocess: Option<PreprocessFn>,
}

impl BatchedKernelMatrix {
    /// Create a driver evaluating at most `block_size` rows of `x` at a time
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(KernelError::InvalidParameter(
                "block size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            block_size,
            preprocess: None,
        })
    }

    pub fn from_config(config: &BatchConfig) -> Result<Self> {
        Self::new(config.block_size)
    }

    /// Apply `f` to each block of `x` and to `y` before evaluation
    ///
    /// `f` must keep the number of rows.
    pub fn with_preprocess<F>(mut self, f: F) -> Self
    where
        F: Fn(MatrixView<'_>) -> Result<Matrix> + Send + Sync + 'static,
    {
        self.preprocess = Some(Box::new(f));
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Assemble the full kernel matrix between `x` and `y`
    ///
    /// Blocks are evaluated with `infer_parameter = false`. A kernel whose
    /// parameters are still unset seeds them from the first block, and every
    /// later block sees the same values.
    pub fn compute<K: Kernel + ?Sized>(
        &self,
        kernel: &K,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
    ) -> Result<Matrix> {
        validate_batches(x, y)?;

        let y_pre = match &self.preprocess {
            Some(f) => Some(self.checked_preprocess(f, y)?),
            None => None,
        };
        let y_view = match &y_pre {
            Some(m) => m.view(),
            None => y.reborrow(),
        };

        let (n, m) = (x.nrows(), y_view.nrows());
        let n_blocks = (n + self.block_size - 1) / self.block_size;
        debug!(
            "{}: assembling {n}x{m} kernel matrix in {n_blocks} block(s) of up to {} rows",
            kernel.name(),
            self.block_size
        );

        let mut out = Matrix::zeros((n, m));
        let starts: Vec<usize> = (0..n).step_by(self.block_size).collect();

        // The first block runs alone so lazily seeded parameters are fixed
        // before any other block reads them
        let first = self.evaluate_block(kernel, x, y_view, 0)?;
        write_block(&mut out, 0, &first);

        #[cfg(feature = "parallel")]
        {
            let rest = starts[1..]
                .par_iter()
                .map(|&start| Ok((start, self.evaluate_block(kernel, x, y_view, start)?)))
                .collect::<Result<Vec<(usize, Matrix)>>>()?;
            for (start, block) in &rest {
                write_block(&mut out, *start, block);
            }
        }

        #[cfg(not(feature = "parallel"))]
        for &start in &starts[1..] {
            let block = self.evaluate_block(kernel, x, y_view, start)?;
            write_block(&mut out, start, &block);
        }

        Ok(out)
    }

    fn evaluate_block<K: Kernel + ?Sized>(
        &self,
        kernel: &K,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        start: usize,
    ) -> Result<Matrix> {
        let end = (start + self.block_size).min(x.nrows());
        trace!("{}: evaluating rows {start}..{end}", kernel.name());

        let block = x.slice(s![start..end, ..]);
        let k = match &self.preprocess {
            Some(f) => {
                let block = self.checked_preprocess(f, block)?;
                kernel.evaluate(block.view(), y, false)?
            }
            None => kernel.evaluate(block, y, false)?,
        };

        if k.dim() != (end - start, y.nrows()) {
            return Err(KernelError::ShapeMismatch(format!(
                "{} returned {:?} for a {}x{} block",
                kernel.name(),
                k.dim(),
                end - start,
                y.nrows()
            )));
        }
        Ok(k)
    }

    fn checked_preprocess(&self, f: &PreprocessFn, batch: MatrixView<'_>) -> Result<Matrix> {
        let out = f(batch)?;
        if out.len_of(Axis(0)) != batch.nrows() {
            return Err(KernelError::ShapeMismatch(format!(
                "preprocessing mapped {} rows to {}",
                batch.nrows(),
                out.nrows()
            )));
        }
        Ok(out)
    }
}

impl fmt::Debug for BatchedKernelMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedKernelMatrix")
            .field("block_size", &self.block_size)
            .field("preprocess", &self.preprocess.is_some())
            .finish()
    }
}

fn write_block(out: &mut Matrix, start: usize, block: &Matrix) {
    let end = start + block.nrows();
    out.slice_mut(s![start..end, ..]).assign(block);
}

/// Kernel matrix between `x` and `y`, evaluated `batch_size` rows at a time
pub fn batch_compute_kernel_matrix<K: Kernel + ?Sized>(
    x: MatrixView<'_>,
    y: MatrixView<'_>,
    kernel: &K,
    batch_size: usize,
) -> Result<Matrix> {
    BatchedKernelMatrix::new(batch_size)?.compute(kernel, x, y)
}
