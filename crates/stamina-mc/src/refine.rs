//! The outer refinement loop.

use crate::errors::{BuildError, BuildResult};
use crate::explorer::{ExploreOutcome, Explorer};
use crate::options::BuildConfig;
use crate::results::ResultInformation;
use stamina_model::{BoundedUntil, CslSolver, NextStateGenerator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One property prepared for refinement: the two augmented variants that
/// respectively exclude (Pmin) and include (Pmax) the absorbing state, plus
/// the optional pruning predicate label (`left ∨ right` of an until).
#[derive(Debug, Clone)]
pub struct PropertyPair {
    pub name: String,
    pub pmin: BoundedUntil,
    pub pmax: BoundedUntil,
    pub refine_label: Option<String>,
}

/// Drives repeated (explore, finalize, solve) rounds, shrinking κ until the
/// Pmin/Pmax window closes or the iteration ceiling is reached.
pub struct Refiner<G, S> {
    explorer: Explorer<G>,
    solver: S,
    config: BuildConfig,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<G: NextStateGenerator, S: CslSolver> Refiner<G, S> {
    pub fn new(explorer: Explorer<G>, solver: S, config: BuildConfig) -> Self {
        Self {
            explorer,
            solver,
            config,
            stop_flag: None,
        }
    }

    /// Install a cancellation flag, checked between iterations and between
    /// per-state expansions.
    pub fn set_stop_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.explorer.set_stop_flag(flag.clone());
        self.stop_flag = flag;
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn explorer(&self) -> &Explorer<G> {
        &self.explorer
    }

    fn cancelled(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Refine one property to a `(Pmin, Pmax)` window.
    ///
    /// Exploration restarts fresh per property; across κ iterations the state
    /// index map is kept so previously explored states retain their indices.
    /// A generator failure or cancellation yields the best window seen so far
    /// (the trivial `[0, 1]` if no round completed).
    pub fn check_property(&mut self, property: &PropertyPair) -> BuildResult<ResultInformation> {
        self.config.validate()?;
        self.explorer.reset(&self.config);
        self.explorer.set_refine_label(if self.config.no_prop_refine {
            None
        } else {
            property.refine_label.clone()
        });

        let mut p_min = 0.0;
        let mut p_max = 1.0;
        let ceiling = self.config.max_approx_count.max(1);
        for round in 0..ceiling {
            if self.cancelled() {
                info!("refinement cancelled, returning best-so-far window");
                break;
            }
            match self.explorer.explore(&self.config) {
                Ok(ExploreOutcome::Complete) => {}
                Ok(ExploreOutcome::Cancelled) => break,
                Err(BuildError::Generator(error)) => {
                    warn!(%error, "generator failed, aborting iteration with best-so-far window");
                    break;
                }
                Err(error) => return Err(error),
            }

            let model = self.explorer.finalize(None)?;
            p_min = self.solver.check(&model, &property.pmin)?;
            p_max = self.solver.check(&model, &property.pmax)?;
            info!(
                property = %property.name,
                round = round + 1,
                kappa = self.explorer.local_kappa(),
                p_min,
                p_max,
                window = p_max - p_min,
                states = model.num_states(),
                "refinement round finished"
            );

            if p_max - p_min <= self.config.prob_win {
                break;
            }
            if round + 1 < ceiling {
                self.explorer.reduce_kappa(self.config.reduce_kappa);
            }
        }

        // The engine owned κ for the run; publish the final value back into
        // the configuration record.
        self.config.kappa = self.explorer.local_kappa();

        Ok(ResultInformation {
            property: property.name.clone(),
            p_min,
            p_max,
            number_states: self.explorer.num_states(),
            number_initial: self.explorer.num_initial_states(),
        })
    }

    /// Refine every property in turn.
    pub fn check_properties(
        &mut self,
        properties: &[PropertyPair],
    ) -> BuildResult<Vec<ResultInformation>> {
        properties
            .iter()
            .map(|property| self.check_property(property))
            .collect()
    }
}
