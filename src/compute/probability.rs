//! Per-cell transition probabilities for one source class.

use super::{Cube, TransitionParams};

/// Probabilities of moving from one source class into each target class.
///
/// Built from the linear predictor
/// `alpha(t,s) + Σ_d beta(t,s,d)·N_d + Σ_e gamma(t,s,e)·E_e`, clamped to
/// [0, 1] per target, then shrunk per cell so the targets sum to at most 1.
/// Whatever is left over is the mortality share.
#[derive(Debug, Clone)]
pub struct ProbabilityField {
    /// Probability layers, (x, y, target).
    pub probs: Cube,
    /// Per-cell share that leaves no descendant in any target.
    pub mortality: Vec<f64>,
    /// Targets with at least one non-zero coefficient for this source.
    pub active: Vec<bool>,
}

impl ProbabilityField {
    /// Build the field for `source`. Shapes are assumed validated.
    pub fn build(
        population: &Cube,
        environment: &Cube,
        params: &TransitionParams,
        source: usize,
    ) -> Self {
        let targets = params.classes();
        let mut probs = Cube::zeros(population.rows, population.cols, targets);
        let mut active = vec![false; targets];

        for (t, is_active) in active.iter_mut().enumerate() {
            if params.is_inert(t, source) {
                continue;
            }
            *is_active = true;

            let layer = probs.layer_mut(t);
            layer.fill(params.alpha.get(t, source));

            // density dependence
            for d in 0..population.layers {
                let b = params.beta.get(t, source, d);
                if b != 0.0 {
                    for (p, &n) in layer.iter_mut().zip(population.layer(d)) {
                        *p += b * n;
                    }
                }
            }

            // environmental dependence
            for e in 0..environment.layers {
                let g = params.gamma.get(t, source, e);
                if g != 0.0 {
                    for (p, &v) in layer.iter_mut().zip(environment.layer(e)) {
                        *p += g * v;
                    }
                }
            }

            for p in layer.iter_mut() {
                *p = p.clamp(0.0, 1.0);
            }
        }

        let cells = probs.layer_len();
        let mut mortality = vec![1.0; cells];
        for (i, m) in mortality.iter_mut().enumerate() {
            let total: f64 = (0..targets).map(|t| probs.data[t * cells + i]).sum();
            if total > 1.0 {
                for t in 0..targets {
                    probs.data[t * cells + i] /= total;
                }
                *m = 0.0;
            } else {
                *m = 1.0 - total;
            }
        }

        Self {
            probs,
            mortality,
            active,
        }
    }

    /// Probability of moving into `target` at flat cell index `cell`.
    #[inline]
    pub fn get(&self, cell: usize, target: usize) -> f64 {
        self.probs.layer(target)[cell]
    }

    /// Total outgoing probability at a cell.
    pub fn outgoing(&self, cell: usize) -> f64 {
        (0..self.probs.layers).map(|t| self.get(cell, t)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Matrix;

    fn params(classes: usize, variables: usize) -> TransitionParams {
        TransitionParams {
            alpha: Matrix::zeros(classes, classes),
            beta: Cube::zeros(classes, classes, classes),
            gamma: Cube::zeros(classes, classes, variables),
        }
    }

    #[test]
    fn test_linear_predictor_and_clamp() {
        let mut p = params(2, 1);
        p.alpha.set(1, 0, 0.2);
        p.beta.set(1, 0, 0, 0.01); // crowding raises maturation
        p.gamma.set(1, 0, 0, -0.5);

        let mut population = Cube::zeros(1, 3, 2);
        population.layer_mut(0).copy_from_slice(&[0.0, 10.0, 200.0]);
        let mut env = Cube::zeros(1, 3, 1);
        env.layer_mut(0).copy_from_slice(&[0.0, 0.2, 0.0]);

        let field = ProbabilityField::build(&population, &env, &p, 0);
        assert!((field.get(0, 1) - 0.2).abs() < 1e-12);
        assert!((field.get(1, 1) - (0.2 + 0.1 - 0.1)).abs() < 1e-12);
        assert_eq!(field.get(2, 1), 1.0);
        assert!(!field.active[0]);
        assert!(field.active[1]);
    }

    #[test]
    fn test_negative_predictor_clamps_to_zero() {
        let mut p = params(2, 0);
        p.alpha.set(0, 0, -0.4);
        let population = Cube::zeros(1, 1, 2);
        let env = Cube::zeros(1, 1, 0);

        let field = ProbabilityField::build(&population, &env, &p, 0);
        assert_eq!(field.get(0, 0), 0.0);
        assert_eq!(field.mortality[0], 1.0);
    }

    #[test]
    fn test_joint_renormalization_preserves_ratios() {
        let mut p = params(3, 0);
        p.alpha.set(0, 0, 0.9);
        p.alpha.set(1, 0, 0.6);
        p.alpha.set(2, 0, 0.3);
        let population = Cube::zeros(1, 1, 3);
        let env = Cube::zeros(1, 1, 0);

        let field = ProbabilityField::build(&population, &env, &p, 0);
        assert!((field.outgoing(0) - 1.0).abs() < 1e-12);
        assert_eq!(field.mortality[0], 0.0);
        assert!((field.get(0, 0) / field.get(0, 1) - 1.5).abs() < 1e-12);
        assert!((field.get(0, 1) / field.get(0, 2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sum_below_one_is_left_alone() {
        let mut p = params(2, 0);
        p.alpha.set(0, 1, 0.3);
        p.alpha.set(1, 1, 0.5);
        let population = Cube::zeros(2, 2, 2);
        let env = Cube::zeros(2, 2, 0);

        let field = ProbabilityField::build(&population, &env, &p, 1);
        for cell in 0..4 {
            assert!((field.get(cell, 0) - 0.3).abs() < 1e-12);
            assert!((field.get(cell, 1) - 0.5).abs() < 1e-12);
            assert!((field.mortality[cell] - 0.2).abs() < 1e-12);
        }
    }
}
