//! Environmental covariates over the course of a run.

use super::error::check_finite;
use super::{Cube, SimError};

/// Environment layers, (x, y, variable), shared or one per step.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentSequence {
    /// One layer reused at every step.
    Static(Cube),
    /// Layer `i` is used at step `i`.
    PerStep(Vec<Cube>),
}

impl EnvironmentSequence {
    /// Pick the representation from the number of layers: one layer is
    /// static, `nsteps` layers are per-step.
    pub fn from_layers(mut layers: Vec<Cube>, nsteps: usize) -> Result<Self, SimError> {
        if layers.len() != 1 && layers.len() != nsteps {
            return Err(SimError::shape(
                "environment sequence",
                format!("1 or {nsteps} layers"),
                format!("{} layers", layers.len()),
            ));
        }
        if let Some(first) = layers.first() {
            let shape = first.shape();
            for (i, layer) in layers.iter().enumerate() {
                if layer.shape() != shape {
                    return Err(SimError::shape(
                        format!("environment layer {i}"),
                        format!("{}x{}x{}", shape.0, shape.1, shape.2),
                        format!("{}x{}x{}", layer.rows, layer.cols, layer.layers),
                    ));
                }
                check_finite(&format!("environment layer {i}"), &layer.data)?;
            }
        }
        if layers.len() == 1 {
            if let Some(layer) = layers.pop() {
                return Ok(Self::Static(layer));
            }
        }
        Ok(Self::PerStep(layers))
    }

    /// Layer in effect at `step`. A single stored layer applies to every
    /// step.
    pub fn layer_for_step(&self, step: usize) -> Option<&Cube> {
        match self {
            Self::Static(layer) => Some(layer),
            Self::PerStep(layers) if layers.len() == 1 => layers.first(),
            Self::PerStep(layers) => layers.get(step),
        }
    }

    /// Number of stored layers.
    pub fn len(&self) -> usize {
        match self {
            Self::Static(_) => 1,
            Self::PerStep(layers) => layers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid shape and variable count, (x, y, variables).
    pub fn shape(&self) -> Option<(usize, usize, usize)> {
        match self {
            Self::Static(layer) => Some(layer.shape()),
            Self::PerStep(layers) => layers.first().map(Cube::shape),
        }
    }

    /// True when the sequence fits an `nsteps` run: one layer, or exactly
    /// one per step.
    pub fn covers(&self, nsteps: usize) -> bool {
        match self {
            Self::Static(_) => true,
            Self::PerStep(layers) => layers.len() == 1 || layers.len() == nsteps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(value: f64) -> Cube {
        let mut c = Cube::zeros(2, 2, 1);
        c.data.fill(value);
        c
    }

    #[test]
    fn test_single_layer_is_static() {
        let env = EnvironmentSequence::from_layers(vec![layer(1.0)], 10).unwrap();
        assert!(matches!(env, EnvironmentSequence::Static(_)));
        assert_eq!(env.layer_for_step(7).unwrap().get(0, 0, 0), 1.0);
        assert!(env.covers(1000));
    }

    #[test]
    fn test_per_step_layers() {
        let env = EnvironmentSequence::from_layers(vec![layer(0.0), layer(1.0), layer(2.0)], 3)
            .unwrap();
        assert_eq!(env.len(), 3);
        assert_eq!(env.layer_for_step(2).unwrap().get(1, 1, 0), 2.0);
        assert!(env.layer_for_step(3).is_none());
    }

    #[test]
    fn test_single_per_step_layer_is_reused() {
        let env = EnvironmentSequence::PerStep(vec![layer(4.0)]);
        assert!(env.covers(3));
        assert_eq!(env.layer_for_step(2).unwrap().get(0, 0, 0), 4.0);
    }

    #[test]
    fn test_covers_requires_exact_length() {
        let env = EnvironmentSequence::PerStep(vec![layer(0.0); 5]);
        assert!(env.covers(5));
        assert!(!env.covers(2));
        assert!(!env.covers(7));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = EnvironmentSequence::from_layers(vec![layer(0.0), layer(1.0)], 5).unwrap_err();
        assert!(matches!(err, SimError::ShapeMismatch { .. }));
        assert!(EnvironmentSequence::from_layers(vec![], 5).is_err());
    }

    #[test]
    fn test_mismatched_layers_rejected() {
        let err = EnvironmentSequence::from_layers(vec![layer(0.0), Cube::zeros(3, 2, 1)], 2)
            .unwrap_err();
        assert!(matches!(err, SimError::ShapeMismatch { .. }));
    }
}
