//! rangesim - Stage-structured spatial population simulation.
//!
//! Individuals on a 2D grid belong to life-stage classes. Each step they
//! move between classes with probabilities driven by intercepts, local
//! density and environmental covariates, reproduce, and have their offspring
//! dispersed through a neighborhood kernel. Runs are either stochastic
//! (integer counts, binomial sampling) or deterministic (expected values).
//!
//! # Architecture
//!
//! - `schema`: Configuration types and initial population patterns
//! - `compute`: Numerical kernels (transition, reproduction, dispersal) and
//!   the simulation driver
//! - `trajectory`: Binary persistence of recorded trajectories
//!
//! # Example
//!
//! ```rust,no_run
//! use rangesim::{
//!     compute::{PopulationStats, sim},
//!     schema::SimulationConfig,
//! };
//!
//! let config = SimulationConfig::default();
//! let scenario = config.build().unwrap();
//!
//! let trajectory = sim(&scenario, &config.run, config.steps).unwrap();
//! println!("Recorded {} slices", trajectory.layers);
//!
//! let stats = PopulationStats::from_population(&scenario.initial);
//! println!("Initial population: {}", stats.total);
//! ```

pub mod compute;
pub mod schema;
pub mod trajectory;

// Re-export commonly used types
pub use compute::{PopulationStats, Scenario, SimError, Simulation, sim};
pub use schema::{ConfigError, InitialPopulation, RunConfig, SimulationConfig};
