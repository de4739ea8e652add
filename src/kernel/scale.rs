//! Scale parameters shared by the distance-based kernels

use crate::bandwidth::BandwidthFn;
use crate::core::{KernelError, Matrix, MatrixView, Result, ScaleValues};
use crate::params::{Constraint, Parameter};
use log::debug;
use ndarray::{array, Zip};

/// A positive kernel parameter, either given explicitly or seeded by a heuristic
///
/// Explicit values are never overwritten by inference. Heuristic-seeded
/// parameters are filled on the first evaluation and refreshed whenever the
/// kernel is called with `infer_parameter = true`.
#[derive(Debug, Clone)]
pub(crate) struct ScaleParameter {
    param: Parameter,
    init_fn: Option<BandwidthFn>,
}

impl ScaleParameter {
    /// Parameter with explicit values in the positive domain
    pub fn explicit(name: &'static str, values: &[f64], trainable: bool) -> Result<Self> {
        Ok(Self {
            param: Parameter::with_values(name, Constraint::Positive, trainable, values)?,
            init_fn: None,
        })
    }

    /// Explicit parameter equal to 1
    pub fn unit(name: &'static str, trainable: bool) -> Self {
        Self {
            param: Parameter::from_raw_unchecked(name, Constraint::Positive, trainable, array![0.0]),
            init_fn: None,
        }
    }

    /// Parameter seeded from data by `init_fn`
    pub fn seeded(name: &'static str, init_fn: BandwidthFn, trainable: bool) -> Self {
        Self {
            param: Parameter::uninitialized(name, Constraint::Positive, trainable),
            init_fn: Some(init_fn),
        }
    }

    /// Explicit values when given, otherwise seeded by `init_fn`
    pub fn from_options(
        name: &'static str,
        values: Option<&[f64]>,
        init_fn: BandwidthFn,
        trainable: bool,
    ) -> Result<Self> {
        match values {
            Some(values) => Self::explicit(name, values, trainable),
            None => Ok(Self::seeded(name, init_fn, trainable)),
        }
    }

    pub fn handle(&self) -> &Parameter {
        &self.param
    }

    /// Run the heuristic when the parameter is unset or inference was requested
    pub fn refresh(
        &self,
        kernel: &'static str,
        x: MatrixView<'_>,
        y: MatrixView<'_>,
        dist: MatrixView<'_>,
        infer_parameter: bool,
    ) -> Result<()> {
        let Some(init_fn) = &self.init_fn else {
            return Ok(());
        };
        let initialized = self.param.is_initialized();
        if initialized && !infer_parameter {
            return Ok(());
        }

        let log_values = init_fn.call(x, y, dist)?;
        self.param.set_raw(log_values)?;
        debug!(
            "{kernel}: {} {} from data: {:?}",
            if initialized { "re-inferred" } else { "initialised" },
            self.param.name(),
            self.param.values()
        );
        Ok(())
    }

    /// Snapshot of this parameter and `other` taken together
    pub fn values_with(
        &self,
        kernel: &'static str,
        other: &ScaleParameter,
    ) -> Result<(ScaleValues, ScaleValues)> {
        let missing = |p: &Parameter| {
            KernelError::InvalidParameter(format!("{kernel}: {} has no value", p.name()))
        };
        match self.param.values_with(&other.param) {
            (Some(a), Some(b)) => Ok((a, b)),
            (None, _) => Err(missing(&self.param)),
            (_, None) => Err(missing(&other.param)),
        }
    }

    /// Snapshot of the current values
    pub fn values(&self, kernel: &'static str) -> Result<ScaleValues> {
        self.param.values().ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "{kernel}: {} has no value",
                self.param.name()
            ))
        })
    }
}

/// Reject inference on trainable kernels
pub(crate) fn check_inference(
    kernel: &'static str,
    parameter: &'static str,
    trainable: bool,
    infer_parameter: bool,
) -> Result<()> {
    if trainable && infer_parameter {
        return Err(KernelError::InferenceConflict { kernel, parameter });
    }
    Ok(())
}

/// Pair two parameter sets index by index, broadcasting a single value
pub(crate) fn zip_params(
    kernel: &'static str,
    a: &ScaleValues,
    b: &ScaleValues,
) -> Result<Vec<(f64, f64)>> {
    let n = a.len().max(b.len());
    if (a.len() != n && a.len() != 1) || (b.len() != n && b.len() != 1) {
        return Err(KernelError::InvalidParameter(format!(
            "{kernel}: cannot pair {} with {} parameter values",
            a.len(),
            b.len()
        )));
    }
    let pick = |v: &ScaleValues, i: usize| if v.len() == 1 { v[0] } else { v[i] };
    Ok((0..n).map(|i| (pick(a, i), pick(b, i))).collect())
}

/// Evaluate `f` over every distance once per parameter value and average
///
/// Averaging keeps the result bounded by the range of a single evaluation,
/// however many bandwidths are configured.
pub(crate) fn mean_over_params<T, F>(dist: &Matrix, params: &[T], f: F) -> Result<Matrix>
where
    T: Copy,
    F: Fn(f64, T) -> f64,
{
    if params.is_empty() {
        return Err(KernelError::InvalidParameter(
            "at least one parameter value is required".to_string(),
        ));
    }
    if let [single] = params {
        return Ok(dist.mapv(|d| f(d, *single)));
    }

    let mut out = Matrix::zeros(dist.raw_dim());
    for &p in params {
        Zip::from(&mut out).and(dist).for_each(|o, &d| *o += f(d, p));
    }
    let n = params.len() as f64;
    out.mapv_inplace(|v| v / n);
    Ok(out)
}
