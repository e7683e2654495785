//! Request input generation

use crate::error::{HarnessError, HarnessResult};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scaleprobe_config::{InputConfig, InputMode};
use std::sync::Arc;

/// Produces the `{n}` values substituted into request paths
#[derive(Debug, Clone)]
pub enum InputGenerator {
    /// Every worker walks the values in order, starting at its own offset
    RoundRobin { values: Arc<[u64]> },
    /// Values drawn independently per request with the given weights
    Weighted {
        values: Arc<[u64]>,
        weights: WeightedIndex<u32>,
    },
}

impl InputGenerator {
    pub fn from_config(config: &InputConfig) -> HarnessResult<Self> {
        if config.values.is_empty() {
            return Err(HarnessError::Configuration(
                "load.input.values must not be empty".to_string(),
            ));
        }
        let values: Arc<[u64]> = config.values.clone().into();

        match config.mode {
            InputMode::RoundRobin => Ok(Self::RoundRobin { values }),
            InputMode::Weighted => {
                if config.weights.len() != config.values.len() {
                    return Err(HarnessError::Configuration(format!(
                        "load.input.weights has {} entries but values has {}",
                        config.weights.len(),
                        config.values.len()
                    )));
                }
                let weights = WeightedIndex::new(&config.weights).map_err(|e| {
                    HarnessError::Configuration(format!("invalid load.input.weights: {}", e))
                })?;
                Ok(Self::Weighted { values, weights })
            }
        }
    }

    /// Always the same input
    pub fn constant(value: u64) -> Self {
        Self::RoundRobin {
            values: Arc::from(vec![value]),
        }
    }

    /// Independent stream for one worker
    pub fn stream(&self, worker_index: usize) -> InputStream {
        InputStream {
            generator: self.clone(),
            position: worker_index,
            rng: StdRng::from_entropy(),
        }
    }
}

/// Per-worker input state; nothing here is shared between workers
#[derive(Debug)]
pub struct InputStream {
    generator: InputGenerator,
    position: usize,
    rng: StdRng,
}

impl InputStream {
    pub fn next_value(&mut self) -> u64 {
        match &self.generator {
            InputGenerator::RoundRobin { values } => {
                let value = values[self.position % values.len()];
                self.position = self.position.wrapping_add(1);
                value
            }
            InputGenerator::Weighted { values, weights } => values[weights.sample(&mut self.rng)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_round_robin_uses_worker_offset() {
        let config = InputConfig {
            mode: InputMode::RoundRobin,
            values: vec![40, 90, 140],
            weights: vec![],
        };
        let generator = InputGenerator::from_config(&config).unwrap();

        let mut first = generator.stream(0);
        let mut second = generator.stream(1);
        let a: Vec<u64> = (0..4).map(|_| first.next_value()).collect();
        let b: Vec<u64> = (0..4).map(|_| second.next_value()).collect();

        assert_eq!(a, vec![40, 90, 140, 40]);
        assert_eq!(b, vec![90, 140, 40, 90]);
    }

    #[test]
    fn test_weighted_draws_follow_weights() {
        let config = InputConfig {
            mode: InputMode::Weighted,
            values: vec![40, 200],
            weights: vec![99, 1],
        };
        let generator = InputGenerator::from_config(&config).unwrap();
        let mut stream = generator.stream(0);

        let mut counts: HashMap<u64, u32> = HashMap::new();
        for _ in 0..2000 {
            *counts.entry(stream.next_value()).or_default() += 1;
        }
        assert!(counts[&40] > 1800);
        assert!(counts.keys().all(|v| *v == 40 || *v == 200));
    }

    #[test]
    fn test_zero_weight_is_never_drawn() {
        let config = InputConfig {
            mode: InputMode::Weighted,
            values: vec![40, 90],
            weights: vec![1, 0],
        };
        let mut stream = InputGenerator::from_config(&config).unwrap().stream(3);
        assert!((0..200).all(|_| stream.next_value() == 40));
    }

    #[test]
    fn test_invalid_input_config() {
        let empty = InputConfig {
            mode: InputMode::RoundRobin,
            values: vec![],
            weights: vec![],
        };
        assert!(InputGenerator::from_config(&empty).is_err());

        let misaligned = InputConfig {
            mode: InputMode::Weighted,
            values: vec![40, 90],
            weights: vec![1],
        };
        assert!(InputGenerator::from_config(&misaligned).is_err());

        let all_zero = InputConfig {
            mode: InputMode::Weighted,
            values: vec![40],
            weights: vec![0],
        };
        assert!(InputGenerator::from_config(&all_zero).is_err());
    }
}
