//! Construction and refinement configuration.

use crate::frontier::Discipline;
use thiserror::Error;

/// Explicit configuration record for one refinement run. The refiner owns it;
/// the engine borrows it immutably per iteration and keeps only its local κ.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Initial reachability threshold κ₀. States with `pi < κ` stay truncated.
    pub kappa: f64,
    /// Per-iteration shrink factor ρ; κ ← κ / ρ between iterations. Must be
    /// greater than 1.
    pub reduce_kappa: f64,
    /// Window tolerance ε: refinement stops once `Pmax − Pmin ≤ ε`.
    pub prob_win: f64,
    /// Iteration ceiling of the refinement loop.
    pub max_approx_count: u32,
    /// Skip property-guided reclassification of states that cannot influence
    /// the property.
    pub no_prop_refine: bool,
    /// Queue discipline and engine strategy.
    pub discipline: Discipline,
    /// Stub states with no enabled choices as unit self-loops instead of
    /// failing the build.
    pub fix_deadlocks: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            kappa: 1.0,
            reduce_kappa: 1.25,
            prob_win: 1e-3,
            max_approx_count: 10,
            no_prop_refine: false,
            discipline: Discipline::Iterative,
            fix_deadlocks: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("kappa must be non-negative, got {0}")]
    NegativeKappa(f64),

    #[error("reduce_kappa must be greater than 1, got {0}")]
    BadReductionFactor(f64),

    #[error("prob_win must be non-negative, got {0}")]
    NegativeWindow(f64),
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kappa.is_nan() || self.kappa < 0.0 {
            return Err(ConfigError::NegativeKappa(self.kappa));
        }
        if self.reduce_kappa.is_nan() || self.reduce_kappa <= 1.0 {
            return Err(ConfigError::BadReductionFactor(self.reduce_kappa));
        }
        if self.prob_win.is_nan() || self.prob_win < 0.0 {
            return Err(ConfigError::NegativeWindow(self.prob_win));
        }
        Ok(())
    }
}
