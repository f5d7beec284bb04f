//! Randomness seam.
//!
//! Vote weights, drift moves, tribunal selection and magnitudes all come from a
//! single primitive, a unit draw in `[0, 1)`. Production uses the thread RNG;
//! tests script the draws so outcomes are exact.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of uniform random draws.
pub trait Dice: Send + Sync {
    /// A draw in `[0, 1)`.
    fn unit(&self) -> f64;

    /// A draw in `[low, high)`.
    fn uniform(&self, low: f64, high: f64) -> f64 {
        low + self.unit() * (high - low)
    }

    /// Fair coin.
    fn coin(&self) -> bool {
        self.unit() < 0.5
    }
}

/// Thread-local RNG backed dice.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDice;

impl Dice for ThreadDice {
    fn unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Replays a fixed sequence of unit draws, cycling when exhausted.
#[derive(Debug)]
pub struct ScriptedDice {
    draws: Vec<f64>,
    cursor: AtomicUsize,
}

impl ScriptedDice {
    /// Values are clamped into `[0, 1)`; an empty script always yields `0.5`.
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        let draws = draws
            .into_iter()
            .map(|d| d.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self {
            draws,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn constant(draw: f64) -> Self {
        Self::new([draw])
    }
}

impl Dice for ScriptedDice {
    fn unit(&self) -> f64 {
        if self.draws.is_empty() {
            return 0.5;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.draws[i % self.draws.len()]
    }
}
