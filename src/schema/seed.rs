//! Initial population patterns.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::{Cube, SimError};

/// Pattern used to generate the initial population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InitialPopulation {
    /// Same count in every cell.
    Uniform {
        count: f64,
        /// Target class (None = all classes).
        class: Option<usize>,
    },
    /// A single occupied cell.
    Point {
        x: usize,
        y: usize,
        class: usize,
        count: f64,
    },
    /// Rectangle of cells starting at `origin`, clipped to the grid.
    Block {
        origin: (usize, usize),
        size: (usize, usize),
        class: usize,
        count: f64,
    },
    /// `individuals` placed one by one in uniformly random cells.
    Scattered {
        individuals: u64,
        class: usize,
        seed: u64,
    },
    /// Sparse list of (x, y, class, count) entries.
    Custom {
        values: Vec<(usize, usize, usize, f64)>,
    },
}

impl Default for InitialPopulation {
    fn default() -> Self {
        InitialPopulation::Block {
            origin: (4, 28),
            size: (8, 8),
            class: 2,
            count: 5.0,
        }
    }
}

impl InitialPopulation {
    /// Generate a `width x height x classes` population.
    ///
    /// Entries outside the grid are dropped; a class index out of range is
    /// an error.
    pub fn generate(&self, width: usize, height: usize, classes: usize) -> Result<Cube, SimError> {
        let mut population = Cube::zeros(width, height, classes);
        let check_class = |class: usize| {
            if class < classes {
                Ok(class)
            } else {
                Err(SimError::shape(
                    "initial population class",
                    format!("index below {classes}"),
                    class.to_string(),
                ))
            }
        };

        match self {
            InitialPopulation::Uniform { count, class } => match class {
                Some(c) => population.layer_mut(check_class(*c)?).fill(*count),
                None => population.data.fill(*count),
            },
            InitialPopulation::Point { x, y, class, count } => {
                let class = check_class(*class)?;
                if *x < width && *y < height {
                    population.set(*x, *y, class, *count);
                }
            }
            InitialPopulation::Block {
                origin,
                size,
                class,
                count,
            } => {
                let class = check_class(*class)?;
                let x_end = (origin.0 + size.0).min(width);
                let y_end = (origin.1 + size.1).min(height);
                for x in origin.0..x_end {
                    for y in origin.1..y_end {
                        population.set(x, y, class, *count);
                    }
                }
            }
            InitialPopulation::Scattered {
                individuals,
                class,
                seed,
            } => {
                let class = check_class(*class)?;
                if width > 0 && height > 0 {
                    let mut rng = StdRng::seed_from_u64(*seed);
                    let layer = population.layer_mut(class);
                    for _ in 0..*individuals {
                        let cell = rng.gen_range(0..width * height);
                        layer[cell] += 1.0;
                    }
                }
            }
            InitialPopulation::Custom { values } => {
                for &(x, y, c, v) in values {
                    let c = check_class(c)?;
                    if x < width && y < height {
                        population.set(x, y, c, v);
                    }
                }
            }
        }

        Ok(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_clipped() {
        let pattern = InitialPopulation::Block {
            origin: (3, 3),
            size: (4, 4),
            class: 1,
            count: 2.0,
        };
        let n = pattern.generate(5, 5, 2).unwrap();
        assert_eq!(n.layer_sum(1), 8.0);
        assert_eq!(n.layer_sum(0), 0.0);
        assert_eq!(n.get(4, 4, 1), 2.0);
    }

    #[test]
    fn test_uniform_all_classes() {
        let n = InitialPopulation::Uniform {
            count: 3.0,
            class: None,
        }
        .generate(2, 3, 2)
        .unwrap();
        assert_eq!(n.sum(), 36.0);
    }

    #[test]
    fn test_scattered_places_every_individual() {
        let pattern = InitialPopulation::Scattered {
            individuals: 250,
            class: 0,
            seed: 9,
        };
        let a = pattern.generate(6, 7, 1).unwrap();
        assert_eq!(a.sum(), 250.0);
        assert_eq!(a, pattern.generate(6, 7, 1).unwrap());
    }

    #[test]
    fn test_bad_class_rejected() {
        let pattern = InitialPopulation::Point {
            x: 0,
            y: 0,
            class: 4,
            count: 1.0,
        };
        assert!(matches!(
            pattern.generate(2, 2, 3),
            Err(SimError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_serde_tagged() {
        let json = r#"{"type": "Custom", "values": [[0, 1, 0, 4.0]]}"#;
        let pattern: InitialPopulation = serde_json::from_str(json).unwrap();
        let n = pattern.generate(2, 2, 1).unwrap();
        assert_eq!(n.get(0, 1, 0), 4.0);
    }
}
