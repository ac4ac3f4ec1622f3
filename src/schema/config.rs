//! Configuration types for range simulations.

use serde::{Deserialize, Serialize};

use super::InitialPopulation;
use crate::compute::{
    Cube, EnvironmentSequence, Matrix, Neighborhood, Scenario, SimError, TransitionParams,
};

fn default_steps() -> usize {
    100
}

fn default_seed() -> u64 {
    1
}

/// How transitions and dispersal are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Integer counts, binomial sampling.
    #[default]
    Stochastic,
    /// Expected values.
    Deterministic,
}

impl Mode {
    #[inline]
    pub fn is_stochastic(self) -> bool {
        self == Mode::Stochastic
    }
}

/// What happens to offspring dispersed past the grid edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Mirrored back into the grid.
    #[default]
    Reflecting,
    /// Lost.
    Absorbing,
}

/// Convolution method for deterministic dispersal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispersalBackend {
    /// FFT for large kernels, direct otherwise.
    #[default]
    Auto,
    Direct,
    Fft,
}

/// Per-run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub boundary: Boundary,
    /// Base seed; per-step seeds are derived from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Class recorded into the trajectory.
    #[serde(default)]
    pub record: usize,
    /// Class that receives dispersed offspring.
    #[serde(default)]
    pub recruit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            boundary: Boundary::default(),
            seed: default_seed(),
            record: 0,
            recruit: 0,
        }
    }
}

/// Demographic coefficients as nested arrays.
///
/// `alpha` is `[target][source]`, `beta` is `[target][source][modifier]` and
/// `gamma` is `[target][source][variable]`. Empty `beta`/`gamma` mean no
/// density or environment effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographyConfig {
    pub alpha: Vec<Vec<f64>>,
    #[serde(default)]
    pub beta: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub gamma: Vec<Vec<Vec<f64>>>,
    /// Offspring per individual, per class.
    pub fecundity: Vec<f64>,
}

/// Spatial pattern for one environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerPattern {
    Constant {
        value: f64,
    },
    /// Linear ramp along x, `from` at x = 0 and `to` at the last row.
    GradientX {
        from: f64,
        to: f64,
    },
    /// Linear ramp along y.
    GradientY {
        from: f64,
        to: f64,
    },
    /// Explicit values, `[x][y]`.
    Custom {
        values: Vec<Vec<f64>>,
    },
}

impl LayerPattern {
    /// Generate a `width x height` field.
    pub fn generate(&self, width: usize, height: usize) -> Result<Matrix, SimError> {
        let ramp = |i: usize, n: usize, from: f64, to: f64| {
            if n > 1 {
                from + (to - from) * i as f64 / (n - 1) as f64
            } else {
                from
            }
        };

        let mut field = Matrix::zeros(width, height);
        match self {
            LayerPattern::Constant { value } => field.data.fill(*value),
            LayerPattern::GradientX { from, to } => {
                for x in 0..width {
                    let v = ramp(x, width, *from, *to);
                    for y in 0..height {
                        field.set(x, y, v);
                    }
                }
            }
            LayerPattern::GradientY { from, to } => {
                for x in 0..width {
                    for y in 0..height {
                        field.set(x, y, ramp(y, height, *from, *to));
                    }
                }
            }
            LayerPattern::Custom { values } => {
                field = Matrix::from_rows(values)?;
                if field.shape() != (width, height) {
                    return Err(SimError::shape(
                        "custom environment layer",
                        format!("{width}x{height}"),
                        format!("{}x{}", field.rows, field.cols),
                    ));
                }
            }
        }
        Ok(field)
    }
}

/// Environmental covariates.
///
/// `layers` holds either one entry used at every step, one entry per step, or
/// nothing (all variables zero). Each entry has one pattern per variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub variables: usize,
    #[serde(default)]
    pub layers: Vec<Vec<LayerPattern>>,
}

impl EnvironmentConfig {
    /// Build the environment sequence for a `width x height` grid and
    /// `nsteps` steps.
    pub fn build(
        &self,
        width: usize,
        height: usize,
        nsteps: usize,
    ) -> Result<EnvironmentSequence, SimError> {
        if self.layers.is_empty() {
            return Ok(EnvironmentSequence::Static(Cube::zeros(
                width,
                height,
                self.variables,
            )));
        }
        let layers = self
            .layers
            .iter()
            .map(|patterns| {
                let fields = patterns
                    .iter()
                    .map(|p| p.generate(width, height))
                    .collect::<Result<Vec<_>, _>>()?;
                if fields.is_empty() {
                    Ok(Cube::zeros(width, height, 0))
                } else {
                    Cube::from_layers(&fields)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        EnvironmentSequence::from_layers(layers, nsteps)
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid extent along x.
    pub width: usize,
    /// Grid extent along y.
    pub height: usize,
    /// Number of life-stage classes.
    pub classes: usize,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub run: RunConfig,
    pub demography: DemographyConfig,
    /// Dispersal kernel, `[row offset][col offset]`, odd side length.
    pub neighborhood: Vec<Vec<f64>>,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    pub initial: InitialPopulation,
    #[serde(default)]
    pub dispersal_backend: DispersalBackend,
}

impl Default for SimulationConfig {
    /// Seedling, juvenile and adult classes on a 64x64 grid with a
    /// temperature-like gradient along x favouring maturation.
    fn default() -> Self {
        let mut beta = vec![vec![vec![0.0; 3]; 3]; 3];
        // Crowding by adults lowers seedling survival.
        beta[0][0][2] = -0.01;
        beta[1][0][2] = -0.01;
        let mut gamma = vec![vec![vec![0.0]; 3]; 3];
        gamma[2][1][0] = 0.2;

        Self {
            width: 64,
            height: 64,
            classes: 3,
            steps: default_steps(),
            run: RunConfig {
                record: 2,
                ..RunConfig::default()
            },
            demography: DemographyConfig {
                alpha: vec![
                    vec![0.2, 0.0, 0.0],
                    vec![0.3, 0.5, 0.0],
                    vec![0.0, 0.2, 0.9],
                ],
                beta,
                gamma,
                fecundity: vec![0.0, 0.0, 4.0],
            },
            neighborhood: gaussian_neighborhood(2, 1.0),
            environment: EnvironmentConfig {
                variables: 1,
                layers: vec![vec![LayerPattern::GradientX { from: 0.0, to: 1.0 }]],
            },
            initial: InitialPopulation::default(),
            dispersal_backend: DispersalBackend::default(),
        }
    }
}

impl SimulationConfig {
    /// Total number of cells.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.classes == 0 {
            return Err(ConfigError::InvalidClasses);
        }
        for (what, index) in [("record", self.run.record), ("recruit", self.run.recruit)] {
            if index >= self.classes {
                return Err(ConfigError::InvalidClassIndex {
                    what,
                    index,
                    classes: self.classes,
                });
            }
        }
        let d = &self.demography;
        if d.alpha.len() != self.classes || d.alpha.iter().any(|row| row.len() != self.classes) {
            return Err(ConfigError::InvalidDemography(format!(
                "alpha must be {c}x{c}",
                c = self.classes
            )));
        }
        if d.fecundity.len() != self.classes {
            return Err(ConfigError::InvalidDemography(format!(
                "fecundity must have {} entries",
                self.classes
            )));
        }
        let env = &self.environment;
        if env.layers.len() > 1 && env.layers.len() != self.steps {
            return Err(ConfigError::InvalidEnvironmentLength {
                layers: env.layers.len(),
                steps: self.steps,
            });
        }
        for (i, patterns) in env.layers.iter().enumerate() {
            if patterns.len() != env.variables {
                return Err(ConfigError::InvalidEnvironmentVariables {
                    layer: i,
                    expected: env.variables,
                    actual: patterns.len(),
                });
            }
        }
        Ok(())
    }

    /// Validate and convert to compute types.
    pub fn build(&self) -> Result<Scenario, ConfigError> {
        self.validate()?;
        let c = self.classes;
        let d = &self.demography;

        let alpha = Matrix::from_rows(&d.alpha)?;
        let beta = if d.beta.is_empty() {
            Cube::zeros(c, c, c)
        } else {
            Cube::from_nested(&d.beta)?
        };
        let gamma = if d.gamma.is_empty() {
            Cube::zeros(c, c, self.environment.variables)
        } else {
            Cube::from_nested(&d.gamma)?
        };

        let scenario = Scenario {
            initial: self.initial.generate(self.width, self.height, c)?,
            environment: self
                .environment
                .build(self.width, self.height, self.steps)?,
            params: TransitionParams::new(alpha, beta, gamma)?,
            fecundity: d.fecundity.clone(),
            neighborhood: Neighborhood::from_rows(&self.neighborhood)?,
        };
        scenario.validate(&self.run, self.steps)?;
        Ok(scenario)
    }
}

/// Normalized isotropic kernel of side `2 * radius + 1` with weights
/// decaying as `exp(-d / scale)`.
pub fn gaussian_neighborhood(radius: usize, scale: f64) -> Vec<Vec<f64>> {
    let size = 2 * radius + 1;
    let centre = radius as f64;
    let mut rows: Vec<Vec<f64>> = (0..size)
        .map(|i| {
            (0..size)
                .map(|j| {
                    let d = ((i as f64 - centre).powi(2) + (j as f64 - centre).powi(2)).sqrt();
                    (-d / scale).exp()
                })
                .collect()
        })
        .collect();
    let total: f64 = rows.iter().flatten().sum();
    for w in rows.iter_mut().flatten() {
        *w /= total;
    }
    rows
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Class count must be non-zero")]
    InvalidClasses,
    #[error("{what} class {index} is out of range for {classes} classes")]
    InvalidClassIndex {
        what: &'static str,
        index: usize,
        classes: usize,
    },
    #[error("Invalid demography: {0}")]
    InvalidDemography(String),
    #[error("Environment has {layers} layers; expected 1 or {steps}")]
    InvalidEnvironmentLength { layers: usize, steps: usize },
    #[error("Environment layer {layer} has {actual} variables; expected {expected}")]
    InvalidEnvironmentVariables {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Simulation(#[from] SimError),
}
