//! Serializable kernel configuration
//!
//! Detector configs describe their kernel as
//! `{"kernel_name": "GaussianRBF", "kernel_config": {...}}`, nesting the same
//! shape for composite kernels. [`KernelConfig::build`] turns such a tree into
//! a ready-to-evaluate kernel.
//!
//! ```
//! use drift_kernels::config::KernelConfig;
//! use drift_kernels::Kernel;
//!
//! let config = KernelConfig::from_json_str(
//!     r#"{"kernel_name": "GaussianRBF", "kernel_config": {"sigma": [1.0, 2.0]}}"#,
//! )
//! .unwrap();
//! let kernel = config.build().unwrap();
//! assert_eq!(kernel.name(), "GaussianRBF");
//! ```

use crate::bandwidth::Heuristic;
use crate::core::{Eps, Kernel, KernelError, Result};
use crate::kernel::{
    divide_kernel, product_kernels, scale_kernel, sum_kernels, DeepKernel, GaussianRBF,
    LinearProjection, Periodic, RationalQuadratic, ScalarOp,
};
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Kernel description as stored in detector configs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kernel_name", content = "kernel_config")]
pub enum KernelConfig {
    GaussianRBF(GaussianRBFConfig),
    RationalQuadratic(RationalQuadraticConfig),
    Periodic(PeriodicConfig),
    Sum(Vec<KernelConfig>),
    Product(Vec<KernelConfig>),
    Scaled {
        kernel: Box<KernelConfig>,
        op: ScalarOp,
    },
    DeepKernel(DeepKernelConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianRBFConfig {
    pub sigma: Option<Vec<f64>>,
    pub init_sigma_fn: Option<Heuristic>,
    pub trainable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RationalQuadraticConfig {
    pub alpha: Option<Vec<f64>>,
    pub init_alpha_fn: Option<Heuristic>,
    pub sigma: Option<Vec<f64>>,
    pub init_sigma_fn: Option<Heuristic>,
    pub trainable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicConfig {
    pub tau: Option<Vec<f64>>,
    pub init_tau_fn: Option<Heuristic>,
    pub sigma: Option<Vec<f64>>,
    pub init_sigma_fn: Option<Heuristic>,
    pub trainable: bool,
}

/// Single linear layer, `weights` given row by row (D rows of K values)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProjectionConfig {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepKernelConfig {
    pub projection: LinearProjectionConfig,
    pub kernel_a: Box<KernelConfig>,
    /// Raw-space kernel; a median-heuristic Gaussian RBF when absent
    #[serde(default)]
    pub kernel_b: Option<Box<KernelConfig>>,
    /// `false` drops the raw-space kernel entirely
    #[serde(default = "default_true")]
    pub use_raw_kernel: bool,
    #[serde(default)]
    pub eps: Eps,
    #[serde(default)]
    pub infer_raw_bandwidth: bool,
}

fn default_true() -> bool {
    true
}

impl KernelConfig {
    /// Build the kernel described by this config
    pub fn build(&self) -> Result<Box<dyn Kernel>> {
        let kernel: Box<dyn Kernel> = match self {
            KernelConfig::GaussianRBF(config) => Box::new(config.build()?),
            KernelConfig::RationalQuadratic(config) => Box::new(config.build()?),
            KernelConfig::Periodic(config) => Box::new(config.build()?),
            KernelConfig::Sum(children) => Box::new(sum_kernels(build_all(children)?)?),
            KernelConfig::Product(children) => {
                Box::new(product_kernels(build_all(children)?)?)
            }
            KernelConfig::Scaled { kernel, op } => {
                let inner = kernel.build()?;
                Box::new(match *op {
                    ScalarOp::Multiply(c) => scale_kernel(inner, c)?,
                    ScalarOp::Divide(c) => divide_kernel(inner, c)?,
                })
            }
            KernelConfig::DeepKernel(config) => Box::new(config.build()?),
        };
        debug!("Built {} kernel from config", kernel.name());
        Ok(kernel)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a config from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save the config as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

fn build_all(children: &[KernelConfig]) -> Result<Vec<Box<dyn Kernel>>> {
    children.iter().map(KernelConfig::build).collect()
}

impl GaussianRBFConfig {
    pub fn build(&self) -> Result<GaussianRBF> {
        let mut builder = GaussianRBF::builder().trainable(self.trainable);
        if let Some(sigma) = &self.sigma {
            builder = builder.sigma(sigma);
        }
        if let Some(heuristic) = self.init_sigma_fn {
            builder = builder.init_sigma_fn(heuristic);
        }
        builder.build()
    }
}

impl RationalQuadraticConfig {
    pub fn build(&self) -> Result<RationalQuadratic> {
        let mut builder = RationalQuadratic::builder().trainable(self.trainable);
        if let Some(alpha) = &self.alpha {
            builder = builder.alpha(alpha);
        }
        if let Some(heuristic) = self.init_alpha_fn {
            builder = builder.init_alpha_fn(heuristic);
        }
        if let Some(sigma) = &self.sigma {
            builder = builder.sigma(sigma);
        }
        if let Some(heuristic) = self.init_sigma_fn {
            builder = builder.init_sigma_fn(heuristic);
        }
        builder.build()
    }
}

impl PeriodicConfig {
    pub fn build(&self) -> Result<Periodic> {
        let mut builder = Periodic::builder().trainable(self.trainable);
        if let Some(tau) = &self.tau {
            builder = builder.tau(tau);
        }
        if let Some(heuristic) = self.init_tau_fn {
            builder = builder.init_tau_fn(heuristic);
        }
        if let Some(sigma) = &self.sigma {
            builder = builder.sigma(sigma);
        }
        if let Some(heuristic) = self.init_sigma_fn {
            builder = builder.init_sigma_fn(heuristic);
        }
        builder.build()
    }
}

impl LinearProjectionConfig {
    pub fn build(&self) -> Result<LinearProjection> {
        let rows = self.weights.len();
        let cols = self.weights.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(KernelError::Config(
                "projection weights must be a non-empty matrix".to_string(),
            ));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != cols) {
            return Err(KernelError::Config(format!(
                "ragged projection weights: rows of length {cols} and {}",
                row.len()
            )));
        }
        let flat: Vec<f64> = self.weights.iter().flatten().copied().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| KernelError::Config(e.to_string()))?;
        LinearProjection::new(weights, Array1::from_vec(self.bias.clone()))
    }
}

impl DeepKernelConfig {
    pub fn build(&self) -> Result<DeepKernel> {
        let projection = self.projection.build()?;
        let mut builder = DeepKernel::builder(projection, self.kernel_a.build()?)
            .eps(self.eps)
            .infer_raw_bandwidth(self.infer_raw_bandwidth);
        match (&self.kernel_b, self.use_raw_kernel) {
            (Some(_), false) => {
                return Err(KernelError::Config(
                    "kernel_b given while use_raw_kernel is false".to_string(),
                ));
            }
            (Some(kernel_b), true) => builder = builder.kernel_b(kernel_b.build()?),
            (None, false) => builder = builder.without_raw_kernel(),
            (None, true) => {}
        }
        builder.build()
    }
}

/// Settings for [`BatchedKernelMatrix`](crate::batch::BatchedKernelMatrix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub block_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { block_size: 10_000 }
    }
}
