//! End-to-end refinement scenarios.

mod common;

use common::{prepare, MatrixGenerator, TestLabel};
use stamina_mc::{
    BuildConfig, BuildError, Discipline, Explorer, PropertyPair, Refiner, ERR_GENERAL,
    ERR_SEVERE,
};
use stamina_model::BoundedUntil;
use stamina_solver::TransientSolver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const TWO_STATE_LOOP: &str = "\
ctmc
module loop
  s : [0..1] init 0;
  [] s = 0 -> 2.0 : (s'=1);
  [] s = 1 -> 1.0 : (s'=0);
endmodule
";

#[test]
fn test_two_state_loop_window_closes_in_one_iteration() {
    let (generator, pairs) = prepare(TWO_STATE_LOOP, "P=? [ F<=1.0 s = 1 ]");
    let config = BuildConfig::default();
    let explorer = Explorer::new(generator, &config).unwrap();
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);

    let result = refiner.check_property(&pairs[0]).unwrap();

    // First passage s0 -> s1 is Exp(2).
    let expected = 1.0 - (-2.0f64).exp();
    assert!(
        (result.p_min - expected).abs() < 1e-6,
        "p_min = {}, expected {expected}",
        result.p_min
    );
    assert!((result.p_max - expected).abs() < 1e-6);
    // No truncated states: the window is closed from the start.
    assert!(result.window() < 1e-9);
    // Absorbing sink plus the two real states.
    assert_eq!(result.number_states, 3);
    assert_eq!(result.number_initial, 1);
}

const DILUTING_WALK: &str = "\
ctmc
module walk
  s : [0..8] init 0;
  [] s < 8 -> 0.9 : (s'=s+1) + 1.1 : (s'=0);
endmodule
";

fn walk_result(max_approx_count: u32) -> stamina_mc::ResultInformation {
    let (generator, pairs) = prepare(DILUTING_WALK, "P=? [ F<=2.0 s = 8 ]");
    let config = BuildConfig {
        kappa: 0.5,
        reduce_kappa: 2.0,
        prob_win: 1e-9,
        max_approx_count,
        ..BuildConfig::default()
    };
    let explorer = Explorer::new(generator, &config).unwrap();
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);
    refiner.check_property(&pairs[0]).unwrap()
}

#[test]
fn test_kappa_refinement_shrinks_window_and_grows_states() {
    let coarse = walk_result(1);
    let fine = walk_result(4);

    // At kappa = 0.5 only the head of the walk is explored: the target is
    // unreachable in the truncated model while the absorbing state soaks up
    // real mass.
    assert!(coarse.p_min < 1e-9);
    assert!(coarse.p_max > coarse.p_min);

    // Two halvings later the bracket must have tightened around the truth,
    // with a monotonically grown state space.
    assert!(fine.window() < coarse.window());
    assert!(fine.number_states >= coarse.number_states);
    assert!(fine.p_min >= coarse.p_min - 1e-12);
}

#[test]
fn test_disciplines_agree_on_bounds() {
    let mut windows = Vec::new();
    for discipline in [
        Discipline::Iterative,
        Discipline::Priority,
        Discipline::ReExploring,
    ] {
        let (generator, pairs) = prepare(DILUTING_WALK, "P=? [ F<=2.0 s = 3 ]");
        let config = BuildConfig {
            kappa: 1e-6,
            discipline,
            ..BuildConfig::default()
        };
        let explorer = Explorer::new(generator, &config).unwrap();
        let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);
        let result = refiner.check_property(&pairs[0]).unwrap();
        windows.push((result.p_min, result.p_max));
    }
    // At a deep kappa all disciplines see the same truncated model.
    for pair in windows.windows(2) {
        assert!((pair[0].0 - pair[1].0).abs() < 1e-9);
        assert!((pair[0].1 - pair[1].1).abs() < 1e-9);
    }
}

const DEADLOCKING: &str = "\
ctmc
module m
  s : [0..2] init 0;
  [] s = 0 -> 1.0 : (s'=1) + 1.0 : (s'=2);
  [] s = 1 -> 1.0 : (s'=0);
endmodule
";

#[test]
fn test_deadlock_state_becomes_labeled_self_loop() {
    let (generator, _) = prepare(DEADLOCKING, "P=? [ F<=1.0 s = 2 ]");
    let config = BuildConfig {
        kappa: 0.1,
        ..BuildConfig::default()
    };
    let mut explorer = Explorer::new(generator, &config).unwrap();
    explorer.explore(&config).unwrap();
    let model = explorer.finalize(None).unwrap();

    // Discovery order: absorbing 0, s0 = 1, s1 = 2, s2 = 3.
    let deadlocked = 3u32;
    assert_eq!(
        model.transitions.row(deadlocked),
        (&[deadlocked][..], &[1.0][..])
    );
    assert!(model.labeling.has_label("deadlock", deadlocked));
    assert!(!model.labeling.has_label("deadlock", 1));
}

#[test]
fn test_deadlock_fatal_when_fixing_disabled() {
    let (generator, _) = prepare(DEADLOCKING, "P=? [ F<=1.0 s = 2 ]");
    let config = BuildConfig {
        kappa: 0.1,
        fix_deadlocks: false,
        ..BuildConfig::default()
    };
    let mut explorer = Explorer::new(generator, &config).unwrap();
    let err = explorer.explore(&config).unwrap_err();
    assert!(matches!(err, BuildError::EmptyBehavior { .. }));
    assert_eq!(err.exit_code(), ERR_GENERAL);
}

#[test]
fn test_empty_initial_states_fatal_with_general_error_code() {
    let generator = MatrixGenerator::new(vec![vec![(1, 1.0)], vec![]], vec![]);
    let config = BuildConfig::default();
    let mut explorer = Explorer::new(generator, &config).unwrap();
    let err = explorer.explore(&config).unwrap_err();
    assert!(matches!(err, BuildError::EmptyInitial));
    assert_eq!(err.exit_code(), ERR_GENERAL);
}

#[test]
fn test_missing_absorbing_variable_is_severe() {
    let generator = MatrixGenerator::without_absorbing_flag(vec![vec![(0, 1.0)]], vec![0]);
    let config = BuildConfig::default();
    let mut explorer = Explorer::new(generator, &config).unwrap();
    let err = explorer.explore(&config).unwrap_err();
    assert!(matches!(err, BuildError::AbsorbingSetupFailed(_)));
    assert_eq!(err.exit_code(), ERR_SEVERE);
}

#[test]
fn test_cancellation_returns_trivial_window() {
    let (generator, pairs) = prepare(DILUTING_WALK, "P=? [ F<=2.0 s = 8 ]");
    let config = BuildConfig::default();
    let explorer = Explorer::new(generator, &config).unwrap();
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);
    let flag = Arc::new(AtomicBool::new(true));
    refiner.set_stop_flag(Some(flag.clone()));

    let result = refiner.check_property(&pairs[0]).unwrap();
    assert_eq!(result.p_min, 0.0);
    assert_eq!(result.p_max, 1.0);

    // Dropping the flag lets the same refiner produce a real window.
    flag.store(false, Ordering::Relaxed);
    let result = refiner.check_property(&pairs[0]).unwrap();
    assert!(result.window() < 1.0);
}

#[test]
fn test_until_property_prunes_and_brackets() {
    // Walk where the until's left operand fails at s = 4: paths past it can
    // never satisfy the property, so pruning may cut them off.
    let model = "\
ctmc
module m
  s : [0..6] init 0;
  [] s < 6 -> 1.0 : (s'=s+1) + 1.0 : (s'=0);
endmodule
";
    let (generator, pairs) = prepare(model, "P=? [ s != 4 U<=3.0 s = 3 ]");
    let config = BuildConfig {
        kappa: 1e-9,
        prob_win: 1e-6,
        ..BuildConfig::default()
    };
    let explorer = Explorer::new(generator, &config).unwrap();
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);
    let result = refiner.check_property(&pairs[0]).unwrap();

    assert!(result.p_min > 0.0);
    assert!(result.p_max <= 1.0);
    assert!(result.p_min <= result.p_max + 1e-12);
    assert!(result.window() < 1e-3);
}

#[test]
fn test_generator_failure_returns_best_so_far() {
    // Rates reference a variable that explodes mid-model: the generator
    // fails once s = 2 is expanded.
    struct Failing {
        inner: MatrixGenerator,
        fail_on: usize,
        loaded: Option<usize>,
    }
    impl stamina_model::NextStateGenerator for Failing {
        fn model_type(&self) -> stamina_model::ModelType {
            self.inner.model_type()
        }
        fn variable_info(&self) -> &stamina_model::VariableInformation {
            self.inner.variable_info()
        }
        fn initial_states(
            &mut self,
            resolve: &mut stamina_model::StateResolver<'_>,
        ) -> Result<Vec<u32>, stamina_model::GeneratorError> {
            self.inner.initial_states(resolve)
        }
        fn load(&mut self, state: &stamina_model::CompressedState) {
            self.loaded = Some(
                self.inner
                    .variable_info()
                    .get_integer(state, &self.inner.variable_info().integers()[0])
                    as usize,
            );
            self.inner.load(state);
        }
        fn expand(
            &mut self,
            resolve: &mut stamina_model::StateResolver<'_>,
        ) -> Result<stamina_model::Behavior, stamina_model::GeneratorError> {
            if self.loaded == Some(self.fail_on) {
                return Err(stamina_model::GeneratorError::Eval(
                    "synthetic failure".to_string(),
                ));
            }
            self.inner.expand(resolve)
        }
        fn label(
            &self,
            states: &[stamina_model::CompressedState],
            initials: &[u32],
            deadlocks: &[u32],
        ) -> Result<stamina_model::StateLabeling, stamina_model::GeneratorError> {
            self.inner.label(states, initials, deadlocks)
        }
        fn eval_label(&self, name: &str) -> Option<bool> {
            self.inner.eval_label(name)
        }
    }

    let inner = MatrixGenerator::new(
        vec![vec![(1, 1.0)], vec![(2, 1.0)], vec![(0, 1.0)]],
        vec![0],
    )
    .with_label(TestLabel {
        name: "goal_min".to_string(),
        ids: vec![2],
        include_absorbing: false,
    })
    .with_label(TestLabel {
        name: "goal_max".to_string(),
        ids: vec![2],
        include_absorbing: true,
    });

    let generator = Failing {
        inner,
        fail_on: 2,
        loaded: None,
    };
    let config = BuildConfig::default();
    let explorer = Explorer::new(generator, &config).unwrap();
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);
    let pair = PropertyPair {
        name: "p".to_string(),
        pmin: BoundedUntil::eventually("goal_min", 1.0),
        pmax: BoundedUntil::eventually("goal_max", 1.0),
        refine_label: None,
    };
    // The failure surfaces as the trivial best-so-far window, not an error.
    let result = refiner.check_property(&pair).unwrap();
    assert_eq!((result.p_min, result.p_max), (0.0, 1.0));
}
