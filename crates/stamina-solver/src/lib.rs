//! Numerical back-end for time-bounded CSL properties.
//!
//! Evaluates `left U<=t right` on a finished sparse CTMC by uniformization:
//! goal states and unsafe states are made absorbing, and the Poisson-weighted
//! goal mass of the uniformized chain is accumulated up to a truncation point.
//! DTMC models are handled best-effort by step-bounded iteration.

mod poisson;

use poisson::poisson_weights;
use stamina_model::{BoundedUntil, CslSolver, ModelType, SolveError, SparseModel};
use tracing::debug;

/// Relative truncation threshold for Poisson terms.
const TERM_EPSILON: f64 = 1e-16;

/// Uniformization-based transient solver.
#[derive(Debug, Default)]
pub struct TransientSolver;

impl TransientSolver {
    pub fn new() -> Self {
        Self
    }
}

impl CslSolver for TransientSolver {
    fn check(&mut self, model: &SparseModel, formula: &BoundedUntil) -> Result<f64, SolveError> {
        let goal = model
            .labeling
            .states(&formula.right_label)
            .ok_or_else(|| SolveError::UnknownLabel(formula.right_label.clone()))?;
        let safe = match &formula.left_label {
            None => None,
            Some(label) => Some(
                model
                    .labeling
                    .states(label)
                    .ok_or_else(|| SolveError::UnknownLabel(label.clone()))?,
            ),
        };
        let init = *model
            .initial_states
            .first()
            .ok_or(SolveError::NoInitialStates)? as usize;

        if goal[init] {
            return Ok(1.0);
        }
        if safe.is_some_and(|safe| !safe[init]) {
            return Ok(0.0);
        }

        // States from which the until is already decided stop moving.
        let masked: Vec<bool> = (0..model.num_states())
            .map(|i| goal[i] || safe.is_some_and(|safe| !safe[i]))
            .collect();

        match model.model_type {
            ModelType::Ctmc => Ok(self.check_ctmc(model, goal, &masked, init, formula.time_bound)),
            ModelType::Dtmc => Ok(self.check_dtmc(model, goal, &masked, init, formula.time_bound)),
            other => Err(SolveError::UnsupportedModel(other)),
        }
    }
}

impl TransientSolver {
    fn check_ctmc(
        &self,
        model: &SparseModel,
        goal: &[bool],
        masked: &[bool],
        init: usize,
        time_bound: f64,
    ) -> f64 {
        let n = model.num_states();
        // Off-diagonal exit rate per state; diagonal entries are CTMC
        // self-loops and cancel in the generator matrix.
        let exit: Vec<f64> = (0..n)
            .map(|i| {
                if masked[i] {
                    return 0.0;
                }
                let (cols, vals) = model.transitions.row(i as u32);
                cols.iter()
                    .zip(vals)
                    .filter(|(&c, _)| c as usize != i)
                    .map(|(_, &v)| v)
                    .sum()
            })
            .collect();

        let q = exit.iter().cloned().fold(0.0f64, f64::max);
        if q <= 0.0 || time_bound <= 0.0 {
            // Nothing moves: the initial state is not a goal state.
            return 0.0;
        }

        let lambda = q * time_bound;
        let (left, weights) = poisson_weights(lambda, TERM_EPSILON);
        let right = left + weights.len();
        debug!(q, lambda, left, right, "uniformization bounds");

        let mut current = vec![0.0f64; n];
        current[init] = 1.0;
        let mut next = vec![0.0f64; n];
        let mut result = 0.0;

        for k in 0..right {
            if k >= left {
                let goal_mass: f64 = current
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| goal[*i])
                    .map(|(_, &p)| p)
                    .sum();
                result += weights[k - left] * goal_mass;
            }
            if k + 1 == right {
                break;
            }
            // One step of the uniformized chain.
            next.iter_mut().for_each(|v| *v = 0.0);
            for (i, &p) in current.iter().enumerate() {
                if p == 0.0 {
                    continue;
                }
                if masked[i] {
                    next[i] += p;
                    continue;
                }
                next[i] += p * (1.0 - exit[i] / q);
                let (cols, vals) = model.transitions.row(i as u32);
                for (&j, &rate) in cols.iter().zip(vals) {
                    if j as usize != i {
                        next[j as usize] += p * rate / q;
                    }
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        result.clamp(0.0, 1.0)
    }

    /// Best-effort DTMC path: `ceil(t)` synchronous steps with decided states
    /// held absorbing.
    fn check_dtmc(
        &self,
        model: &SparseModel,
        goal: &[bool],
        masked: &[bool],
        init: usize,
        time_bound: f64,
    ) -> f64 {
        let n = model.num_states();
        let steps = time_bound.max(0.0).ceil() as usize;
        let mut current = vec![0.0f64; n];
        current[init] = 1.0;
        let mut next = vec![0.0f64; n];

        for _ in 0..steps {
            next.iter_mut().for_each(|v| *v = 0.0);
            for (i, &p) in current.iter().enumerate() {
                if p == 0.0 {
                    continue;
                }
                if masked[i] {
                    next[i] += p;
                    continue;
                }
                let (cols, vals) = model.transitions.row(i as u32);
                let total: f64 = vals.iter().sum();
                if total <= 0.0 {
                    next[i] += p;
                    continue;
                }
                for (&j, &prob) in cols.iter().zip(vals) {
                    next[j as usize] += p * prob / total;
                }
            }
            std::mem::swap(&mut current, &mut next);
        }

        current
            .iter()
            .enumerate()
            .filter(|(i, _)| goal[*i])
            .map(|(_, &p)| p)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}
