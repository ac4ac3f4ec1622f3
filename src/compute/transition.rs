//! Stage-transition engine.
//!
//! Moves individuals between life-stage classes at every cell, either by
//! sequential binomial sampling or by expected values.

use rand::Rng;

use super::error::{check_finite, check_non_negative};
use super::rng::{binomial, check_counts, seeded_rng};
use super::{Cube, Matrix, ProbabilityField, SimError};
use crate::schema::Mode;

/// Demographic transition coefficients.
///
/// - `alpha`: intercepts, (target, source)
/// - `beta`: density effects, (target, source, modifier class)
/// - `gamma`: environment effects, (target, source, variable)
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionParams {
    pub alpha: Matrix,
    pub beta: Cube,
    pub gamma: Cube,
}

impl TransitionParams {
    /// Bundle coefficients, checking they agree on the class count.
    pub fn new(alpha: Matrix, beta: Cube, gamma: Cube) -> Result<Self, SimError> {
        let params = Self { alpha, beta, gamma };
        params.check_shapes()?;
        Ok(params)
    }

    /// Number of classes.
    #[inline]
    pub fn classes(&self) -> usize {
        self.alpha.rows
    }

    /// Number of environment variables.
    #[inline]
    pub fn variables(&self) -> usize {
        self.gamma.layers
    }

    /// True when no coefficient links `source` to `target`.
    pub fn is_inert(&self, target: usize, source: usize) -> bool {
        self.alpha.get(target, source) == 0.0
            && self.beta.tube(target, source).all(|b| b == 0.0)
            && self.gamma.tube(target, source).all(|g| g == 0.0)
    }

    fn check_shapes(&self) -> Result<(), SimError> {
        let c = self.alpha.rows;
        if self.alpha.cols != c {
            return Err(SimError::shape(
                "alpha",
                format!("{c}x{c} (target x source)"),
                format!("{}x{}", self.alpha.rows, self.alpha.cols),
            ));
        }
        if self.beta.shape() != (c, c, c) {
            return Err(SimError::shape(
                "beta",
                format!("{c}x{c}x{c} (target x source x modifier)"),
                format!("{}x{}x{}", self.beta.rows, self.beta.cols, self.beta.layers),
            ));
        }
        if self.gamma.rows != c || self.gamma.cols != c {
            return Err(SimError::shape(
                "gamma",
                format!("{c}x{c}xV (target x source x variable)"),
                format!(
                    "{}x{}x{}",
                    self.gamma.rows, self.gamma.cols, self.gamma.layers
                ),
            ));
        }
        check_finite("alpha", &self.alpha.data)?;
        check_finite("beta", &self.beta.data)?;
        check_finite("gamma", &self.gamma.data)?;
        Ok(())
    }

    /// Check coefficients against a population and one environment layer.
    pub fn check_against(&self, population: &Cube, environment: &Cube) -> Result<(), SimError> {
        self.check_shapes()?;
        if population.layers != self.classes() {
            return Err(SimError::shape(
                "population class axis",
                format!("{} classes", self.classes()),
                format!("{} classes", population.layers),
            ));
        }
        if (environment.rows, environment.cols) != (population.rows, population.cols) {
            return Err(SimError::shape(
                "environment grid",
                format!("{}x{}", population.rows, population.cols),
                format!("{}x{}", environment.rows, environment.cols),
            ));
        }
        if environment.layers != self.variables() {
            return Err(SimError::shape(
                "environment variable axis",
                format!("{} variables (gamma)", self.variables()),
                format!("{} variables", environment.layers),
            ));
        }
        Ok(())
    }
}

/// Perform one stage transition with a generator seeded from `seed`.
pub fn transition(
    population: &Cube,
    environment: &Cube,
    params: &TransitionParams,
    mode: Mode,
    seed: u64,
) -> Result<Cube, SimError> {
    let mut rng = seeded_rng(seed);
    transition_with_rng(population, environment, params, mode, &mut rng)
}

/// Perform one stage transition, drawing from `rng`.
///
/// Returns a new population of the same shape. In stochastic mode fractional
/// counts are truncated before sampling; draws are consumed source by
/// source, then target by target, then cell by cell.
pub fn transition_with_rng<R: Rng + ?Sized>(
    population: &Cube,
    environment: &Cube,
    params: &TransitionParams,
    mode: Mode,
    rng: &mut R,
) -> Result<Cube, SimError> {
    params.check_against(population, environment)?;
    check_non_negative("population", &population.data)?;
    check_finite("environment", &environment.data)?;
    if mode.is_stochastic() {
        check_counts("population", &population.data)?;
    }

    let mut next = Cube::zeros(population.rows, population.cols, population.layers);

    for source in 0..params.classes() {
        if (0..params.classes()).all(|t| params.is_inert(t, source)) {
            continue;
        }
        let field = ProbabilityField::build(population, environment, params, source);
        let counts = population.layer(source);
        match mode {
            Mode::Stochastic => allocate_sampled(counts, &field, &mut next, rng),
            Mode::Deterministic => allocate_expected(counts, &field, &mut next),
        }
    }

    Ok(next)
}

/// Sequential binomial split of each cell's source count across targets.
///
/// Each target's draw is conditioned on what is still unallocated: its
/// probability is renormalized against itself, the targets after it and the
/// mortality share.
fn allocate_sampled<R: Rng + ?Sized>(
    counts: &[f64],
    field: &ProbabilityField,
    next: &mut Cube,
    rng: &mut R,
) {
    let cells = counts.len();
    let mut unallocated: Vec<u64> = counts.iter().map(|&n| n.floor() as u64).collect();
    let mut tail: Vec<f64> = (0..cells)
        .map(|i| field.outgoing(i) + field.mortality[i])
        .collect();

    for (target, &active) in field.active.iter().enumerate() {
        if !active {
            continue;
        }
        let probs = field.probs.layer(target);
        let out = next.layer_mut(target);
        for i in 0..cells {
            let p = probs[i];
            if p > 0.0 && unallocated[i] > 0 {
                let share = if tail[i] > 0.0 { p / tail[i] } else { 0.0 };
                let drawn = binomial(rng, unallocated[i], share);
                unallocated[i] -= drawn;
                out[i] += drawn as f64;
            }
            tail[i] -= p;
        }
    }
}

/// Expected-value split: `N_s · p_t` for every target.
fn allocate_expected(counts: &[f64], field: &ProbabilityField, next: &mut Cube) {
    for (target, &active) in field.active.iter().enumerate() {
        if !active {
            continue;
        }
        let probs = field.probs.layer(target);
        for ((out, &n), &p) in next.layer_mut(target).iter_mut().zip(counts).zip(probs) {
            *out += n * p;
        }
    }
}
