//! Simulation driver.
//!
//! Each step runs transition, reproduction and dispersal in turn, adds the
//! dispersed offspring to the recruitment class and records one class.

use serde::{Deserialize, Serialize};

use super::error::check_non_negative;
use super::rng::{MixedSeeds, SeedStrategy, Stage, check_counts, seeded_rng};
use super::{
    Cube, Disperser, EnvironmentSequence, Neighborhood, SimError, TransitionParams, reproduce,
    transition_with_rng,
};
use crate::schema::{DispersalBackend, RunConfig};

/// Everything a run needs apart from its run configuration.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Initial population, (x, y, class).
    pub initial: Cube,
    pub environment: EnvironmentSequence,
    pub params: TransitionParams,
    /// Offspring per individual, one entry per class.
    pub fecundity: Vec<f64>,
    pub neighborhood: Neighborhood,
}

impl Scenario {
    /// Check every shape and value a run of `nsteps` will touch.
    pub fn validate(&self, run: &RunConfig, nsteps: usize) -> Result<(), SimError> {
        let (rows, cols, classes) = self.initial.shape();

        if !self.environment.covers(nsteps) {
            return Err(SimError::shape(
                "environment sequence",
                format!("1 or {nsteps} layers"),
                format!("{} layers", self.environment.len()),
            ));
        }
        if let Some(layer) = self.environment.layer_for_step(0) {
            self.params.check_against(&self.initial, layer)?;
        } else if nsteps > 0 {
            return Err(SimError::shape("environment sequence", "at least 1 layer", "0 layers"));
        }
        if self.fecundity.len() != classes {
            return Err(SimError::shape(
                "fecundity",
                format!("{classes} entries (one per class)"),
                format!("{} entries", self.fecundity.len()),
            ));
        }
        check_non_negative("fecundity", &self.fecundity)?;
        for (what, index) in [("recorded class", run.record), ("recruitment class", run.recruit)] {
            if index >= classes {
                return Err(SimError::shape(
                    what,
                    format!("index below {classes}"),
                    index.to_string(),
                ));
            }
        }
        check_non_negative("initial population", &self.initial.data)?;
        if run.mode.is_stochastic() {
            check_counts("initial population", &self.initial.data)?;
        }
        log::debug!(
            "validated scenario: {rows}x{cols} grid, {classes} classes, kernel radius {}",
            self.neighborhood.radius()
        );
        Ok(())
    }

    pub fn classes(&self) -> usize {
        self.initial.layers
    }
}

/// Stepwise simulation over a borrowed [`Scenario`].
pub struct Simulation<'a> {
    scenario: &'a Scenario,
    run: RunConfig,
    disperser: Disperser,
    seeds: Box<dyn SeedStrategy>,
    population: Cube,
    trajectory: Cube,
    step: usize,
    nsteps: usize,
}

impl<'a> Simulation<'a> {
    /// Validate inputs and prepare an `nsteps` run.
    pub fn new(scenario: &'a Scenario, run: RunConfig, nsteps: usize) -> Result<Self, SimError> {
        Self::with_backend(scenario, run, nsteps, DispersalBackend::default())
    }

    /// As [`Simulation::new`] with an explicit dispersal backend.
    pub fn with_backend(
        scenario: &'a Scenario,
        run: RunConfig,
        nsteps: usize,
        backend: DispersalBackend,
    ) -> Result<Self, SimError> {
        scenario.validate(&run, nsteps)?;

        let population = scenario.initial.clone();
        let (rows, cols, _) = population.shape();
        let disperser = Disperser::new(scenario.neighborhood.clone(), rows, cols, backend);

        let mut trajectory = Cube::zeros(rows, cols, nsteps + 1);
        trajectory
            .layer_mut(0)
            .copy_from_slice(population.layer(run.record));

        log::info!(
            "simulation ready: {rows}x{cols} grid, {} classes, {nsteps} steps, {:?} mode, {:?} boundary{}",
            population.layers,
            run.mode,
            run.boundary,
            if disperser.uses_fft() { ", FFT dispersal" } else { "" }
        );

        Ok(Self {
            scenario,
            run,
            disperser,
            seeds: Box::new(MixedSeeds),
            population,
            trajectory,
            step: 0,
            nsteps,
        })
    }

    /// Replace the per-step seed derivation.
    pub fn with_seed_strategy(mut self, seeds: impl SeedStrategy + 'static) -> Self {
        self.seeds = Box::new(seeds);
        self
    }

    /// Advance one step. On error the population is left as it was before
    /// the step and the error carries the step index.
    pub fn step(&mut self) -> Result<(), SimError> {
        let step = self.step;
        if step >= self.nsteps {
            return Err(SimError::invalid(
                "step",
                format!("run already finished after {} steps", self.nsteps),
            ));
        }
        let next = self.advance(step).map_err(|e| e.at_step(step))?;

        self.trajectory
            .layer_mut(step + 1)
            .copy_from_slice(next.layer(self.run.record));
        self.population = next;
        self.step += 1;

        log::debug!(
            "step {}/{}: total population {:.1}",
            self.step,
            self.nsteps,
            self.population.sum()
        );
        Ok(())
    }

    fn advance(&self, step: usize) -> Result<Cube, SimError> {
        let environment = self.scenario.environment.layer_for_step(step).ok_or_else(|| {
            SimError::shape(
                "environment sequence",
                format!("a layer for step {step}"),
                format!("{} layers", self.scenario.environment.len()),
            )
        })?;

        let mut rng = seeded_rng(self.seeds.derive(self.run.seed, step, Stage::Transition));
        let mut next = transition_with_rng(
            &self.population,
            environment,
            &self.scenario.params,
            self.run.mode,
            &mut rng,
        )?;

        let offspring = reproduce(&next, &self.scenario.fecundity)?;

        let mut rng = seeded_rng(self.seeds.derive(self.run.seed, step, Stage::Dispersal));
        let recruits = self
            .disperser
            .disperse(&offspring, self.run.boundary, self.run.mode, &mut rng)?;

        for (n, &r) in next
            .layer_mut(self.run.recruit)
            .iter_mut()
            .zip(&recruits.data)
        {
            *n += r;
        }

        Ok(next)
    }

    /// Run all remaining steps.
    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.is_finished() {
            self.step()?;
        }
        log::info!(
            "simulation finished after {} steps: total population {:.1}",
            self.step,
            self.population.sum()
        );
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.nsteps
    }

    /// Steps completed so far.
    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    /// Current population, (x, y, class).
    pub fn population(&self) -> &Cube {
        &self.population
    }

    /// Current values of the recorded class.
    pub fn recorded(&self) -> &[f64] {
        self.population.layer(self.run.record)
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    /// Recorded class so far: layer `i` is the state after `i` steps.
    pub fn trajectory(&self) -> &Cube {
        &self.trajectory
    }

    pub fn into_trajectory(self) -> Cube {
        self.trajectory
    }
}

/// Run a whole simulation and return the recorded trajectory,
/// (x, y, nsteps + 1).
pub fn sim(scenario: &Scenario, run: &RunConfig, nsteps: usize) -> Result<Cube, SimError> {
    let mut simulation = Simulation::new(scenario, run.clone(), nsteps)?;
    simulation.run()?;
    Ok(simulation.into_trajectory())
}

/// Population summary for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub total: f64,
    pub class_totals: Vec<f64>,
    /// Cells where any class is present.
    pub occupied_cells: usize,
    /// Largest single-cell, single-class value.
    pub max_density: f64,
}

impl PopulationStats {
    pub fn from_population(population: &Cube) -> Self {
        let class_totals: Vec<f64> = (0..population.layers)
            .map(|k| population.layer_sum(k))
            .collect();
        let cells = population.layer_len();
        let occupied_cells = (0..cells)
            .filter(|&i| (0..population.layers).any(|k| population.layer(k)[i] > 0.0))
            .count();
        let max_density = population.data.iter().copied().fold(0.0, f64::max);

        Self {
            total: class_totals.iter().sum(),
            class_totals,
            occupied_cells,
            max_density,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Matrix, disperse, transition};
    use crate::schema::{Boundary, Mode};

    fn plus_kernel() -> Neighborhood {
        Neighborhood::from_rows(&[
            vec![0.0, 0.1, 0.0],
            vec![0.1, 0.6, 0.1],
            vec![0.0, 0.1, 0.0],
        ])
        .unwrap()
    }

    /// Seedlings, juveniles and adults on a small grid; adults reproduce.
    fn test_scenario(rows: usize, cols: usize) -> Scenario {
        let mut alpha = Matrix::zeros(3, 3);
        alpha.set(0, 0, 0.2);
        alpha.set(1, 0, 0.3);
        alpha.set(1, 1, 0.5);
        alpha.set(2, 1, 0.3);
        alpha.set(2, 2, 0.8);
        let mut beta = Cube::zeros(3, 3, 3);
        beta.set(1, 0, 2, -0.001);
        let mut gamma = Cube::zeros(3, 3, 1);
        gamma.set(2, 1, 0, 0.1);

        let mut initial = Cube::zeros(rows, cols, 3);
        initial.set(rows / 2, cols / 2, 2, 40.0);

        let mut env = Cube::zeros(rows, cols, 1);
        env.data.fill(0.5);

        Scenario {
            initial,
            environment: EnvironmentSequence::Static(env),
            params: TransitionParams::new(alpha, beta, gamma).unwrap(),
            fecundity: vec![0.0, 0.0, 3.0],
            neighborhood: plus_kernel(),
        }
    }

    fn run_config(mode: Mode) -> RunConfig {
        RunConfig {
            mode,
            boundary: Boundary::Reflecting,
            seed: 7,
            record: 2,
            recruit: 0,
        }
    }

    #[test]
    fn test_zero_steps_returns_initial_slice() {
        let scenario = test_scenario(5, 5);
        let run = run_config(Mode::Stochastic);
        let trajectory = sim(&scenario, &run, 0).unwrap();
        assert_eq!(trajectory.shape(), (5, 5, 1));
        assert_eq!(trajectory.layer(0), scenario.initial.layer(2));
    }

    #[test]
    fn test_trajectory_shape_and_first_slice() {
        let scenario = test_scenario(6, 4);
        let trajectory = sim(&scenario, &run_config(Mode::Deterministic), 5).unwrap();
        assert_eq!(trajectory.shape(), (6, 4, 6));
        assert_eq!(trajectory.layer(0), scenario.initial.layer(2));
    }

    #[test]
    fn test_deterministic_step_matches_kernels() {
        let scenario = test_scenario(5, 5);
        let run = run_config(Mode::Deterministic);
        let mut simulation = Simulation::new(&scenario, run.clone(), 1).unwrap();
        simulation.step().unwrap();

        let env = scenario.environment.layer_for_step(0).unwrap();
        let mut expected =
            transition(&scenario.initial, env, &scenario.params, run.mode, 0)
                .unwrap();
        let offspring = reproduce(&expected, &scenario.fecundity).unwrap();
        let recruits = disperse(
            &offspring,
            &scenario.neighborhood,
            run.boundary,
            run.mode,
            0,
        )
        .unwrap();
        for (n, r) in expected.layer_mut(0).iter_mut().zip(&recruits.data) {
            *n += r;
        }

        for (a, b) in simulation.population().data.iter().zip(&expected.data) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(simulation.trajectory().layer(1), expected.layer(2));
    }

    #[test]
    fn test_stochastic_runs_reproducible() {
        let scenario = test_scenario(6, 6);
        let run = run_config(Mode::Stochastic);
        let a = sim(&scenario, &run, 8).unwrap();
        let b = sim(&scenario, &run, 8).unwrap();
        assert_eq!(a, b);

        let mut other = run.clone();
        other.seed = 8;
        let c = sim(&scenario, &other, 8).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_stochastic_counts_stay_integral_and_non_negative() {
        let scenario = test_scenario(6, 6);
        let mut simulation = Simulation::new(&scenario, run_config(Mode::Stochastic), 10).unwrap();
        simulation.run().unwrap();
        assert!(simulation.is_finished());
        assert!(
            simulation
                .population()
                .data
                .iter()
                .all(|v| *v >= 0.0 && v.fract() == 0.0)
        );
    }

    #[test]
    fn test_time_varying_environment_is_indexed_by_step() {
        let mut scenario = test_scenario(3, 3);
        // Step 0 blocks maturation entirely, step 1 forces it.
        let mut closed = Cube::zeros(3, 3, 1);
        closed.data.fill(-100.0);
        let mut open = Cube::zeros(3, 3, 1);
        open.data.fill(100.0);
        scenario.environment = EnvironmentSequence::from_layers(vec![closed, open], 2).unwrap();
        scenario.initial = Cube::zeros(3, 3, 3);
        scenario.initial.layer_mut(1).fill(10.0);

        let mut run = run_config(Mode::Deterministic);
        run.record = 2;
        let trajectory = sim(&scenario, &run, 2).unwrap();
        assert!(trajectory.layer(1).iter().all(|&v| v == 0.0));
        assert!(trajectory.layer(2).iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_single_per_step_layer_applies_to_every_step() {
        let mut scenario = test_scenario(3, 3);
        scenario.environment = EnvironmentSequence::PerStep(vec![Cube::zeros(3, 3, 1)]);
        let run = run_config(Mode::Deterministic);
        let trajectory = sim(&scenario, &run, 3).unwrap();
        assert_eq!(trajectory.shape(), (3, 3, 4));

        scenario.environment = EnvironmentSequence::Static(Cube::zeros(3, 3, 1));
        assert_eq!(sim(&scenario, &run, 3).unwrap(), trajectory);
    }

    #[test]
    fn test_environment_longer_than_run_rejected() {
        let mut scenario = test_scenario(3, 3);
        scenario.environment = EnvironmentSequence::PerStep(vec![Cube::zeros(3, 3, 1); 5]);
        let err = sim(&scenario, &run_config(Mode::Deterministic), 2).unwrap_err();
        assert!(matches!(err, SimError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_environment_length_must_match_steps() {
        let mut scenario = test_scenario(3, 3);
        let layer = Cube::zeros(3, 3, 1);
        scenario.environment = EnvironmentSequence::PerStep(vec![layer.clone(), layer]);
        let err = sim(&scenario, &run_config(Mode::Deterministic), 5).unwrap_err();
        assert!(matches!(err, SimError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_bad_class_index_rejected() {
        let scenario = test_scenario(3, 3);
        let mut run = run_config(Mode::Deterministic);
        run.record = 3;
        assert!(matches!(
            sim(&scenario, &run, 1),
            Err(SimError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_step_failure_carries_step_index() {
        let mut scenario = test_scenario(3, 3);
        // A per-step environment whose second layer is malformed only
        // surfaces when that step runs.
        let good = Cube::zeros(3, 3, 1);
        let bad = Cube::zeros(3, 3, 2);
        scenario.environment = EnvironmentSequence::PerStep(vec![good, bad]);
        let mut simulation =
            Simulation::new(&scenario, run_config(Mode::Deterministic), 2).unwrap();
        simulation.step().unwrap();
        let before = simulation.population().clone();
        let err = simulation.step().unwrap_err();
        assert_eq!(err.step(), Some(1));
        assert_eq!(simulation.population(), &before);
        assert_eq!(simulation.step_index(), 1);
    }

    #[test]
    fn test_step_past_end_is_an_error() {
        let scenario = test_scenario(3, 3);
        let mut simulation =
            Simulation::new(&scenario, run_config(Mode::Deterministic), 1).unwrap();
        simulation.run().unwrap();
        assert!(simulation.step().is_err());
    }

    #[test]
    fn test_population_stats() {
        let mut n = Cube::zeros(2, 2, 2);
        n.set(0, 0, 0, 3.0);
        n.set(0, 0, 1, 1.0);
        n.set(1, 1, 1, 6.0);
        let stats = PopulationStats::from_population(&n);
        assert_eq!(stats.total, 10.0);
        assert_eq!(stats.class_totals, vec![3.0, 7.0]);
        assert_eq!(stats.occupied_cells, 2);
        assert_eq!(stats.max_density, 6.0);
    }
}
