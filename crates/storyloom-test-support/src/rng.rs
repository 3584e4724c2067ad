//! Test RNG — deterministic `DeterministicRng` implementations for tests.

use std::collections::VecDeque;

use storyloom_core::rng::DeterministicRng;

/// A no-op RNG that always returns `min` for `next_u32_range` and `0.0` for
/// `next_f64`. Suitable for tests that do not depend on specific random values.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}

/// An RNG that returns values from predetermined sequences. Panics if a
/// sequence is exhausted. Used in tests that need specific, repeatable random
/// outcomes (e.g., forcing a combat exchange to `HitHit`).
#[derive(Debug)]
pub struct SequenceRng {
    values: VecDeque<u32>,
    floats: VecDeque<f64>,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given integer values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values: values.into(),
            floats: VecDeque::new(),
        }
    }

    /// Sets the values returned by `next_f64`.
    #[must_use]
    pub fn with_floats(mut self, floats: Vec<f64>) -> Self {
        self.floats = floats.into();
        self
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, _min: u32, _max: u32) -> u32 {
        self.values
            .pop_front()
            .expect("SequenceRng integer sequence exhausted")
    }

    fn next_f64(&mut self) -> f64 {
        self.floats
            .pop_front()
            .expect("SequenceRng float sequence exhausted")
    }
}
