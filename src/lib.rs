//! Kernel matrices for kernel-based drift detection
//!
//! Two-sample tests such as MMD compare a reference batch against incoming
//! data through a kernel matrix. This crate provides the kernels (Gaussian RBF,
//! rational quadratic, periodic, their sums/products and a deep kernel over a
//! learned projection), the bandwidth heuristics that seed their scale
//! parameters, and a batched driver for large reference sets.

pub mod bandwidth;
pub mod batch;
pub mod config;
pub mod core;
pub mod distance;
pub mod kernel;
pub mod params;
pub mod utils;

// Re-export main types for convenience
pub use crate::bandwidth::{log_sigma_mean, log_sigma_median, sigma_median, BandwidthFn, Heuristic};
pub use crate::batch::{batch_compute_kernel_matrix, BatchedKernelMatrix};
pub use crate::config::{BatchConfig, KernelConfig};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{KernelError, Result};
pub use crate::distance::squared_pairwise_distance;
pub use crate::kernel::{
    divide_kernel, product_kernels, scale_kernel, sum_kernels, CompositeKernel, DeepKernel,
    GaussianRBF, LinearProjection, Periodic, RationalQuadratic,
};
pub use crate::params::{Constraint, Parameter, ParameterStore};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
