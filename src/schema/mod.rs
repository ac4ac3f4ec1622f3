//! Schema module - Configuration and initial population types for range simulations.

mod config;
mod seed;

pub use config::*;
pub use seed::*;
