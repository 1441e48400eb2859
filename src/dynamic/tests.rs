use crate::dynamic::{
    ArrowCell, PolicyAlgorithm, PolicyIteration, SolverConfig, Termination, ValueIteration,
};
use crate::gridworld::{Action, Coord, Grid, GridConfig, Rewards, TransitionModel};
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn open_grid() -> Grid {
    Grid::from_layout(&["S.O", "...", "O.E"], Rewards::default()).unwrap()
}

// Two plain cells walled in at (2, 2) and (2, 3) with no way out.
fn pocket_grid() -> Grid {
    Grid::from_layout(
        &["S...O", ".###.", ".#.#.", ".#.#.", "O###E"],
        Rewards::default(),
    )
    .unwrap()
}

fn assert_golden(solver: &dyn PolicyAlgorithm<'_>) {
    let core = solver.core();
    let expected = [
        ((0, 0), -8.0),
        ((1, 0), -3.0),
        ((2, 0), -2.0),
        ((0, 1), -3.0),
        ((1, 1), -2.0),
        ((2, 1), -1.0),
        ((0, 2), -2.0),
        ((1, 2), -1.0),
        ((2, 2), 0.0),
    ];
    for ((x, y), value) in expected {
        assert_abs_diff_eq!(
            core.value_function()[&Coord::new(x, y)],
            value,
            epsilon = 1e-9
        );
    }

    let down = ArrowCell::Move {
        action: Action::Down,
        hazard: false,
    };
    let right = ArrowCell::Move {
        action: Action::Right,
        hazard: false,
    };
    let arrows = core.arrow_grid();
    assert_eq!(arrows.row(0).to_vec(), vec![down, down, down]);
    assert_eq!(arrows.row(1).to_vec(), vec![down, down, down]);
    assert_eq!(arrows.row(2).to_vec(), vec![right, right, ArrowCell::Terminal]);
}

#[test]
fn test_golden_policy_iteration_sync() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut solver = PolicyIteration::new(&model, SolverConfig::default(), true);
    let report = solver.derive_policy().unwrap();
    assert_eq!(report.termination, Termination::Converged);
    assert_golden(&solver);
}

#[test]
fn test_golden_policy_iteration_async() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut solver = PolicyIteration::new(&model, SolverConfig::default(), false);
    let report = solver.derive_policy().unwrap();
    assert_eq!(report.termination, Termination::Converged);
    assert_golden(&solver);
}

#[test]
fn test_golden_value_iteration_sync() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);
    let report = solver.derive_policy().unwrap();
    assert_eq!(report.termination, Termination::Converged);
    assert_eq!(report.epochs, 5);
    assert_abs_diff_eq!(report.deltas[0], 32.0_f64.sqrt(), epsilon = 1e-12);
    assert_eq!(*report.deltas.last().unwrap(), 0.0);
    assert_golden(&solver);
}

#[test]
fn test_golden_value_iteration_async() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut solver = ValueIteration::new(&model, SolverConfig::default(), false);
    let report = solver.derive_policy().unwrap();
    assert_eq!(report.termination, Termination::Converged);
    assert_golden(&solver);
}

#[test]
fn test_golden_policy_text() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut solver = ValueIteration::new(&model, SolverConfig::default(), true);
    solver.derive_policy().unwrap();
    let text = solver.core().render_policy();
    let rows: Vec<Vec<&str>> = text
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect())
        .collect();
    assert_eq!(rows[0], ["0", "↓", "↓", "↓"]);
    assert_eq!(rows[1], ["1", "↓", "↓", "↓"]);
    assert_eq!(rows[2], ["2", "→", "→", "E"]);
}

#[test]
fn test_policy_and_value_iteration_agree() {
    for seed in 0..10 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let config = GridConfig {
            size: 6,
            ..GridConfig::default()
        };
        let grid = Grid::generate(&config, &mut rng).unwrap();
        let model = TransitionModel::deterministic(&grid);

        let mut pi = PolicyIteration::new(&model, SolverConfig::default(), true);
        let mut vi = ValueIteration::new(&model, SolverConfig::default(), true);
        let pi_report = pi.derive_policy().unwrap();
        let vi_report = vi.derive_policy().unwrap();

        assert_eq!(pi_report.termination, vi_report.termination, "seed {seed}");
        let pi_values = pi.core().value_function();
        let vi_values = vi.core().value_function();
        assert_eq!(pi_values.len(), vi_values.len());
        for (state, value) in pi_values {
            assert_abs_diff_eq!(*value, vi_values[state], epsilon = 0.01);
        }
    }
}

#[test]
fn test_improvement_is_idempotent_after_convergence() {
    let grid = open_grid();
    let model = TransitionModel::stochastic(&grid, 0.2).unwrap();

    let mut vi = ValueIteration::new(&model, SolverConfig::default(), true);
    vi.derive_policy().unwrap();
    let again = vi.core().policy_improvement().unwrap();
    assert_eq!(&again, vi.core().policy());

    let mut pi = PolicyIteration::new(&model, SolverConfig::default(), true);
    pi.derive_policy().unwrap();
    let again = pi.core().policy_improvement().unwrap();
    assert_eq!(&again, pi.core().policy());
}

#[test]
fn test_zero_epochs_leaves_state_untouched() {
    let grid = open_grid();
    let model = TransitionModel::deterministic(&grid);
    let config = SolverConfig {
        epochs: 0,
        ..SolverConfig::default()
    };

    let mut pi = PolicyIteration::new(&model, config.clone(), true);
    let before = pi.core().clone();
    let report = pi.derive_policy().unwrap();
    assert!(report.deltas.is_empty());
    assert_eq!(report.epochs, 0);
    assert_eq!(report.termination, Termination::EpochCap);
    assert_eq!(pi.core().policy(), before.policy());
    assert_eq!(pi.core().value_function(), before.value_function());

    let mut vi = ValueIteration::new(&model, config, false);
    let before = vi.core().clone();
    let report = vi.derive_policy().unwrap();
    assert!(report.deltas.is_empty());
    assert_eq!(vi.core().policy(), before.policy());
    assert_eq!(vi.core().value_function(), before.value_function());
}

#[test]
fn test_epoch_cap_is_reported() {
    let grid = pocket_grid();
    let model = TransitionModel::deterministic(&grid);
    let config = SolverConfig {
        epochs: 3,
        ..SolverConfig::default()
    };
    let mut vi = ValueIteration::new(&model, config, true);
    let report = vi.derive_policy().unwrap();
    assert_eq!(report.termination, Termination::EpochCap);
    assert_eq!(report.epochs, 3);
    assert_eq!(report.deltas.len(), 3);
}

#[test]
fn test_walled_pocket_is_detected_as_alternating() {
    let grid = pocket_grid();
    let model = TransitionModel::deterministic(&grid);
    let size = grid.size();

    let solvers: Vec<Box<dyn PolicyAlgorithm<'_> + '_>> = vec![
        Box::new(ValueIteration::new(&model, SolverConfig::default(), true)),
        Box::new(ValueIteration::new(&model, SolverConfig::default(), false)),
        Box::new(PolicyIteration::new(&model, SolverConfig::default(), true)),
    ];
    for mut solver in solvers {
        let report = solver.derive_policy().unwrap();
        assert_eq!(report.termination, Termination::AlternatingPolicies);
        assert!(report.epochs < 60, "took {} epochs", report.epochs);

        let recent = &report.deltas[report.epochs - size..];
        for delta in recent {
            assert_abs_diff_eq!(*delta, recent[0], epsilon = 0.01);
            assert!(*delta >= 0.01);
        }

        let core = solver.core();
        assert!(core.value_function()[&Coord::new(2, 2)] < -5.0);
        assert_abs_diff_eq!(core.value_function()[&Coord::new(4, 3)], -1.0);
    }
}

#[test]
fn test_walled_pocket_sync_delta() {
    let grid = pocket_grid();
    let model = TransitionModel::deterministic(&grid);
    let mut vi = ValueIteration::new(&model, SolverConfig::default(), true);
    let report = vi.derive_policy().unwrap();
    // Both pocket cells lose exactly one point per sweep.
    assert_abs_diff_eq!(
        *report.deltas.last().unwrap(),
        2.0_f64.sqrt(),
        epsilon = 1e-9
    );
}

#[test]
fn test_stochastic_value_iteration_on_generated_grid() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let config = GridConfig {
        size: 6,
        ..GridConfig::default()
    };
    let grid = Grid::generate(&config, &mut rng).unwrap();
    let model = TransitionModel::stochastic(&grid, 0.2).unwrap();
    let mut vi = ValueIteration::new(&model, SolverConfig::default(), true);
    let report = vi.derive_policy().unwrap();

    assert_eq!(report.deltas.len(), report.epochs);
    assert!(report.epochs > 0);
    let core = vi.core();
    assert_eq!(core.value_function()[&grid.end()], 0.0);
    for &value in core.value_function().values() {
        let scaled = value * 1000.0;
        assert!((scaled - scaled.round()).abs() < 1e-6);
    }
    for row in core.policy().values() {
        assert_eq!(row.values().sum::<f64>(), 1.0);
    }
}

#[test]
fn test_trap_arrows_carry_hazard_flag() {
    let grid = Grid::from_layout(&["S..O", ".T..", "....", "O..E"], Rewards::default()).unwrap();
    let model = TransitionModel::deterministic(&grid);
    let mut vi = ValueIteration::new(&model, SolverConfig::default(), true);
    vi.derive_policy().unwrap();
    let arrows = vi.core().arrow_grid();
    assert!(matches!(arrows[[1, 1]], ArrowCell::Move { hazard: true, .. }));
    assert!(matches!(arrows[[0, 0]], ArrowCell::Move { hazard: false, .. }));
    assert!(vi.core().render_policy().contains('*'));
}
