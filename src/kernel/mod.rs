//! Kernel functions for two-sample tests

pub mod composite;
pub mod deep;
pub mod gaussian;
pub mod periodic;
pub mod rational_quadratic;
mod scale;

pub use self::composite::*;
pub use self::deep::*;
pub use self::gaussian::*;
pub use self::periodic::*;
pub use self::rational_quadratic::*;
pub use crate::core::{Kernel, Projection};
