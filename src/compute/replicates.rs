//! Independent replicate runs.

use rayon::prelude::*;

use super::rng::{MixedSeeds, SeedStrategy, Stage};
use super::{Cube, Scenario, SimError, sim};
use crate::schema::RunConfig;

/// Trajectories of a replicate batch and their per-cell mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Replicates {
    /// One trajectory per replicate, in replicate order.
    pub trajectories: Vec<Cube>,
    /// Mean over replicates, same shape as each trajectory.
    pub mean: Cube,
}

impl Replicates {
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Per-cell sample variance (n - 1 denominator); zero for fewer than
    /// two replicates.
    pub fn variance(&self) -> Cube {
        let mut var = Cube::zeros(self.mean.rows, self.mean.cols, self.mean.layers);
        let n = self.trajectories.len();
        if n < 2 {
            return var;
        }
        for trajectory in &self.trajectories {
            for ((v, &x), &m) in var.data.iter_mut().zip(&trajectory.data).zip(&self.mean.data) {
                *v += (x - m) * (x - m);
            }
        }
        let scale = 1.0 / (n - 1) as f64;
        var.data.iter_mut().for_each(|v| *v *= scale);
        var
    }
}

/// Run `n` replicates of `scenario` in parallel.
///
/// Replicate `i` uses the base seed derived from `run.seed` and `i`, so the
/// batch is reproducible and independent of thread scheduling.
pub fn run_replicates(
    scenario: &Scenario,
    run: &RunConfig,
    nsteps: usize,
    n: usize,
) -> Result<Replicates, SimError> {
    if n == 0 {
        return Err(SimError::invalid("replicate count", "must be at least 1"));
    }
    scenario.validate(run, nsteps)?;
    log::info!("running {n} replicates of {nsteps} steps");

    let trajectories: Vec<Cube> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut replicate = run.clone();
            replicate.seed = MixedSeeds.derive(run.seed, i, Stage::Replicate);
            sim(scenario, &replicate, nsteps)
        })
        .collect::<Result<_, _>>()?;

    let (rows, cols, layers) = trajectories[0].shape();
    let mut mean = Cube::zeros(rows, cols, layers);
    for trajectory in &trajectories {
        for (m, &x) in mean.data.iter_mut().zip(&trajectory.data) {
            *m += x;
        }
    }
    let scale = 1.0 / n as f64;
    mean.data.iter_mut().for_each(|m| *m *= scale);

    Ok(Replicates { trajectories, mean })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{EnvironmentSequence, Matrix, Neighborhood, TransitionParams};
    use crate::schema::{Boundary, Mode};

    fn scenario() -> Scenario {
        let mut alpha = Matrix::zeros(2, 2);
        alpha.set(0, 0, 0.4);
        alpha.set(1, 0, 0.3);
        alpha.set(1, 1, 0.8);
        let mut initial = Cube::zeros(4, 4, 2);
        initial.set(1, 2, 1, 20.0);
        Scenario {
            initial,
            environment: EnvironmentSequence::Static(Cube::zeros(4, 4, 0)),
            params: TransitionParams::new(alpha, Cube::zeros(2, 2, 2), Cube::zeros(2, 2, 0))
                .unwrap(),
            fecundity: vec![0.0, 2.0],
            neighborhood: Neighborhood::from_rows(&[
                vec![0.05, 0.1, 0.05],
                vec![0.1, 0.4, 0.1],
                vec![0.05, 0.1, 0.05],
            ])
            .unwrap(),
        }
    }

    fn run() -> RunConfig {
        RunConfig {
            mode: Mode::Stochastic,
            boundary: Boundary::Reflecting,
            seed: 3,
            record: 1,
            recruit: 0,
        }
    }

    #[test]
    fn test_replicates_are_reproducible_and_distinct() {
        let s = scenario();
        let a = run_replicates(&s, &run(), 6, 4).unwrap();
        let b = run_replicates(&s, &run(), 6, 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_ne!(a.trajectories[0], a.trajectories[1]);
    }

    #[test]
    fn test_mean_matches_trajectories() {
        let s = scenario();
        let reps = run_replicates(&s, &run(), 3, 5).unwrap();
        let idx = reps.mean.idx(1, 2, 3);
        let manual: f64 = reps.trajectories.iter().map(|t| t.data[idx]).sum::<f64>() / 5.0;
        assert!((reps.mean.data[idx] - manual).abs() < 1e-12);
        assert!(reps.variance().data.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_zero_replicates_rejected() {
        assert!(matches!(
            run_replicates(&scenario(), &run(), 3, 0),
            Err(SimError::InvalidParameter { .. })
        ));
    }
}
