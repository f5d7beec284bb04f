//! The Index Mutator.
//!
//! One pure function decides how a signed percentage moves an Index. Votes,
//! drift, tribunal shocks and operator adjustments all call it so damping can
//! never differ between call sites.

use serde::{Deserialize, Serialize};

/// Fraction of a loss that survives while Stability Protocol is active.
pub const DEFAULT_DAMPEN_FACTOR: f64 = 0.5;

/// Round to 2 decimal places, half-up.
///
/// The small bias absorbs binary representation error so that values such as
/// `1.005` land on `1.01` the way a decimal column would store them.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    let nudged = scaled + scaled.signum() * 1e-7;
    nudged.round() / 100.0
}

/// Applies signed percentage deltas to Index values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexMutator {
    dampen_factor: f64,
}

impl Default for IndexMutator {
    fn default() -> Self {
        Self {
            dampen_factor: DEFAULT_DAMPEN_FACTOR,
        }
    }
}

impl IndexMutator {
    /// Create a mutator with a custom damping factor, clamped to `[0, 1]`.
    pub fn new(dampen_factor: f64) -> Self {
        let dampen_factor = if dampen_factor.is_finite() {
            dampen_factor.clamp(0.0, 1.0)
        } else {
            DEFAULT_DAMPEN_FACTOR
        };
        Self { dampen_factor }
    }

    pub fn dampen_factor(&self) -> f64 {
        self.dampen_factor
    }

    /// The delta that will actually be applied. Stability only softens losses.
    pub fn effective_delta(&self, delta_percent: f64, stability_active: bool) -> f64 {
        if stability_active && delta_percent < 0.0 {
            delta_percent * self.dampen_factor
        } else {
            delta_percent
        }
    }

    /// `max(0, current × (1 + effective/100))`, rounded to cents.
    pub fn apply(&self, current: f64, delta_percent: f64, stability_active: bool) -> f64 {
        let effective = self.effective_delta(delta_percent, stability_active);
        let next = current * (1.0 + effective / 100.0);
        round2(next.max(0.0))
    }
}
