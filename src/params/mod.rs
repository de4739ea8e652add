//! Shared kernel parameters
//!
//! Kernels never own the optimizer. Each scale parameter lives in a
//! [`Parameter`] handle: a lock-protected cell holding the *unconstrained*
//! values together with the [`Constraint`] that maps them into the domain the
//! kernel formula needs. A training loop collects the handles of a kernel
//! tree into a [`ParameterStore`] and writes new unconstrained values through
//! it; kernels see the update on their next evaluation.

use crate::core::{logit, sigmoid, Kernel, KernelError, Result, ScaleValues};
use ndarray::Array1;
use std::sync::{Arc, RwLock};

/// Mapping from the unconstrained representation to the parameter domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// value = exp(raw), always > 0
    Positive,
    /// value = sigmoid(raw), always in (0, 1)
    UnitInterval,
    /// value = raw
    Unconstrained,
}

impl Constraint {
    /// Map an unconstrained value into the parameter domain
    pub fn forward(&self, raw: f64) -> f64 {
        match self {
            Constraint::Positive => raw.exp(),
            Constraint::UnitInterval => sigmoid(raw),
            Constraint::Unconstrained => raw,
        }
    }

    /// Map a value from the parameter domain back to its unconstrained form
    pub fn inverse(&self, value: f64) -> Result<f64> {
        match self {
            Constraint::Positive if value > 0.0 && value.is_finite() => Ok(value.ln()),
            Constraint::UnitInterval if value > 0.0 && value < 1.0 => Ok(logit(value)),
            Constraint::Unconstrained if value.is_finite() => Ok(value),
            _ => Err(KernelError::InvalidParameter(format!(
                "{value} is outside the domain of a {self:?} parameter"
            ))),
        }
    }
}

/// Handle to a kernel parameter shared with an external optimizer
///
/// Cloning a handle is cheap and yields a handle to the *same* cell.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: &'static str,
    constraint: Constraint,
    trainable: bool,
    raw: Arc<RwLock<Option<ScaleValues>>>,
}

impl Parameter {
    /// Create a parameter without a value yet
    pub fn uninitialized(name: &'static str, constraint: Constraint, trainable: bool) -> Self {
        Self {
            name,
            constraint,
            trainable,
            raw: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a parameter from values in the constrained domain
    pub fn with_values(
        name: &'static str,
        constraint: Constraint,
        trainable: bool,
        values: &[f64],
    ) -> Result<Self> {
        let param = Self::uninitialized(name, constraint, trainable);
        param.set_values(values).map_err(|e| match e {
            KernelError::InvalidParameter(msg) => {
                KernelError::InvalidParameter(format!("{name}: {msg}"))
            }
            other => other,
        })?;
        Ok(param)
    }

    /// Create a parameter from an unconstrained value
    pub fn with_raw(
        name: &'static str,
        constraint: Constraint,
        trainable: bool,
        raw: ScaleValues,
    ) -> Result<Self> {
        let param = Self::uninitialized(name, constraint, trainable);
        param.set_raw(raw)?;
        Ok(param)
    }

    /// Create a parameter from unconstrained values known to be finite and non-empty
    pub(crate) fn from_raw_unchecked(
        name: &'static str,
        constraint: Constraint,
        trainable: bool,
        raw: ScaleValues,
    ) -> Self {
        Self {
            name,
            constraint,
            trainable,
            raw: Arc::new(RwLock::new(Some(raw))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// Number of values (bandwidths), 0 while uninitialised
    pub fn len(&self) -> usize {
        self.read().as_ref().map_or(0, |raw| raw.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the unconstrained values
    pub fn raw(&self) -> Option<ScaleValues> {
        self.read().clone()
    }

    /// Snapshot of the constrained values
    pub fn values(&self) -> Option<ScaleValues> {
        let constraint = self.constraint;
        self.read()
            .as_ref()
            .map(|raw| raw.mapv(|r| constraint.forward(r)))
    }

    /// Replace the unconstrained values
    pub fn set_raw(&self, raw: ScaleValues) -> Result<()> {
        if raw.is_empty() {
            return Err(KernelError::InvalidParameter(format!(
                "{} needs at least one value",
                self.name
            )));
        }
        if let Some(bad) = raw.iter().find(|r| !r.is_finite()) {
            return Err(KernelError::InvalidParameter(format!(
                "{} received non-finite value {bad}",
                self.name
            )));
        }
        *self.raw.write().unwrap_or_else(|e| e.into_inner()) = Some(raw);
        Ok(())
    }

    /// Replace the values, given in the constrained domain
    pub fn set_values(&self, values: &[f64]) -> Result<()> {
        let raw = values
            .iter()
            .map(|&v| self.constraint.inverse(v))
            .collect::<Result<Vec<f64>>>()?;
        self.set_raw(Array1::from(raw))
    }

    /// Constrained values of two parameters, read while both locks are held
    ///
    /// No single write can land between the two reads, so the pair never mixes
    /// an old value of one parameter with a new value of the other from the
    /// same [`ParameterStore::update`].
    pub fn values_with(&self, other: &Parameter) -> (Option<ScaleValues>, Option<ScaleValues>) {
        if self.shares_state_with(other) {
            let values = self.values();
            return (values.clone(), values);
        }
        let (a, b) = (self.read(), other.read());
        (
            a.as_ref().map(|raw| raw.mapv(|r| self.constraint.forward(r))),
            b.as_ref().map(|raw| raw.mapv(|r| other.constraint.forward(r))),
        )
    }

    /// Whether two handles point at the same cell
    pub fn shares_state_with(&self, other: &Parameter) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<ScaleValues>> {
        self.raw.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of parameter handles owned by a training loop
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: Vec<Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every parameter of a kernel tree
    pub fn from_kernel<K: Kernel + ?Sized>(kernel: &K) -> Self {
        let mut store = Self::new();
        for param in kernel.parameters() {
            store.register(param);
        }
        store
    }

    /// Register a handle and return its index; a handle already present
    /// keeps its original index
    pub fn register(&mut self, param: Parameter) -> usize {
        if let Some(index) = self.params.iter().position(|p| p.shares_state_with(&param)) {
            return index;
        }
        self.params.push(param);
        self.params.len() - 1
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    /// First parameter registered under `name`
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Indices of parameters an optimizer may update
    pub fn trainable_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_trainable())
            .map(|(i, _)| i)
            .collect()
    }

    /// Unconstrained values of every parameter, in registration order
    pub fn snapshot(&self) -> Vec<Option<ScaleValues>> {
        self.params.iter().map(Parameter::raw).collect()
    }

    /// Write new unconstrained values into a trainable parameter
    ///
    /// Each call is atomic for its parameter. A step that updates several
    /// parameters should not overlap an evaluation of the same kernel tree,
    /// or that evaluation may see part of the step.
    pub fn update(&self, index: usize, raw: ScaleValues) -> Result<()> {
        let param = self.params.get(index).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "no parameter at index {index} (store holds {})",
                self.params.len()
            ))
        })?;
        if !param.is_trainable() {
            return Err(KernelError::InvalidParameter(format!(
                "{} is not trainable",
                param.name()
            )));
        }
        param.set_raw(raw)
    }
}
