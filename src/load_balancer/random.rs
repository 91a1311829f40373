//! Uniform random selection strategy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::Picker;

/// Uniform random picker with no memory of prior picks.
#[derive(Debug)]
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Picker for RandomPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed sequence of picks, cycling when exhausted.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct SequencePicker {
    picks: Vec<usize>,
    next: usize,
}

#[cfg(test)]
impl SequencePicker {
    pub(crate) fn new(picks: Vec<usize>) -> Self {
        Self { picks, next: 0 }
    }
}

#[cfg(test)]
impl Picker for SequencePicker {
    fn pick(&mut self, _len: usize) -> usize {
        let pick = self.picks[self.next % self.picks.len()];
        self.next += 1;
        pick
    }
}
