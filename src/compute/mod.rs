//! Compute module - Numerical kernels and the simulation driver.

mod array;
mod dispersal;
mod environment;
mod error;
mod fft;
mod neighborhood;
mod probability;
mod replicates;
mod reproduction;
pub mod rng;
mod simulation;
mod transition;

pub use array::*;
pub use dispersal::*;
pub use environment::*;
pub use error::SimError;
pub use fft::*;
pub use neighborhood::*;
pub use probability::*;
pub use replicates::*;
pub use reproduction::*;
pub use simulation::*;
pub use transition::*;
