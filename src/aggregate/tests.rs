use super::*;
use crate::config::EngineConfig;
use crate::model::{ExperimentId, GroupKey, ResultRow, Role};

const EPSILON: f64 = 1e-12;

fn key(algo: &str, ground_truth: &str) -> GroupKey {
    GroupKey {
        objective_metric: "AP@k".to_string(),
        optim_algo: algo.to_string(),
        we_model: "models/glove.840B.300d.magnitude".to_string(),
        ground_truth_name: ground_truth.to_string(),
    }
}

fn row(id: &str, role: Role, value: f64) -> ResultRow {
    ResultRow {
        role,
        experiment_id: ExperimentId::new(id),
        group_key: key("powell", "usa_states"),
        metric_value: value,
        status: Some("succeeded".to_string()),
    }
}

fn experiment(id: &str, baseline: f64, optimized: f64) -> Vec<ResultRow> {
    vec![
        row(id, Role::Baseline, baseline),
        row(id, Role::Optimized, optimized),
    ]
}

fn twins(cohort: &[(&str, f64, f64)]) -> Vec<ExperimentTwin> {
    let rows = cohort
        .iter()
        .flat_map(|(id, baseline, optimized)| experiment(id, *baseline, *optimized))
        .collect::<Vec<ResultRow>>();
    let selected = rows.iter().collect::<Vec<&ResultRow>>();
    let paired = pair_by_experiment(&selected);
    assert!(paired.warnings().is_empty());
    paired.twins().to_vec()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn improvement_is_zero_for_zero_baseline() {
    for optimized in [0.0, 0.1, -3.0, 42.0] {
        assert_eq!(improvement(0.0, optimized), 0.0);
    }
    assert_eq!(improvement(-0.0, 1.0), 0.0);
}

#[test]
fn improvement_is_relative_change_otherwise() {
    assert_close(improvement(0.5, 0.6), 0.6 / 0.5 - 1.0);
    assert_close(improvement(2.0, 1.0), -0.5);
    assert_eq!(improvement(0.25, 0.25), 0.0);
}

#[test]
fn reduce_cohort_returns_none_for_empty_cohort() {
    assert!(reduce_cohort(&[], WorstTieBreak::Lexicographic).is_none());
}

#[test]
fn reduce_cohort_on_worked_example() {
    let cohort = twins(&[("1", 0.5, 0.6), ("2", 0.5, 0.4), ("3", 0.0, 0.1)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");

    assert_eq!(summary.cohort_size, 3);
    assert_eq!(summary.worst.experiment_id.as_str(), "2");
    assert_close(summary.worst.improvement, 0.4 / 0.5 - 1.0);

    // 0.1 - 0.0 is a hair above 0.6 - 0.5 in binary floating point
    assert_eq!(summary.best.experiment_id.as_str(), "3");
    assert_eq!(summary.best.improvement, 0.0);

    assert_close(summary.average.baseline_value, 1.0 / 3.0);
    assert_close(summary.average.optimized_value, 1.1 / 3.0);
    assert_close(summary.average.improvement_from_individual, 0.0);
    assert_close(summary.average.improvement_from_averages, 0.1);
}

#[test]
fn worst_is_minimum_delta_and_best_is_maximum_delta() {
    let cohort = twins(&[
        ("a", 0.30, 0.45),
        ("b", 0.40, 0.10),
        ("c", 0.20, 0.90),
        ("d", 0.60, 0.55),
        ("e", 0.10, 0.05),
    ]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");

    for twin in &cohort {
        let worst_delta = summary.worst.optimized_value - summary.worst.baseline_value;
        let best_delta = summary.best.optimized_value - summary.best.baseline_value;
        assert!(worst_delta <= twin.delta());
        assert!(best_delta >= twin.delta());
    }
    assert_eq!(summary.worst.experiment_id.as_str(), "b");
    assert_eq!(summary.best.experiment_id.as_str(), "c");
}

#[test]
fn worst_ties_prefer_smaller_baseline() {
    let cohort = twins(&[("high", 0.75, 0.5), ("low", 0.5, 0.25), ("mid", 0.625, 0.375)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");
    assert_eq!(summary.worst.experiment_id.as_str(), "low");
}

#[test]
fn worst_full_ties_keep_first_encountered() {
    let cohort = twins(&[("first", 0.5, 0.25), ("second", 0.5, 0.25)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");
    assert_eq!(summary.worst.experiment_id.as_str(), "first");
}

#[test]
fn best_ties_prefer_last_encountered() {
    let cohort = twins(&[("first", 0.25, 0.75), ("middle", 0.5, 0.5), ("last", 0.5, 1.0)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");
    assert_eq!(summary.best.experiment_id.as_str(), "last");

    let reversed = cohort.iter().rev().cloned().collect::<Vec<ExperimentTwin>>();
    let summary = reduce_cohort(&reversed, WorstTieBreak::Lexicographic).expect("summary");
    assert_eq!(summary.best.experiment_id.as_str(), "first");
}

#[test]
fn worst_never_trades_delta_for_baseline() {
    let cohort = twins(&[("big_drop", 0.5, 0.0), ("small_baseline", 0.125, 0.25)]);

    for tie_break in [WorstTieBreak::Lexicographic, WorstTieBreak::LegacyShortCircuit] {
        let summary = reduce_cohort(&cohort, tie_break).expect("summary");
        assert_eq!(summary.worst.experiment_id.as_str(), "big_drop");
    }
}

#[test]
fn legacy_worst_keeps_first_strict_minimum() {
    let cohort = twins(&[("drop", 0.5, 0.4), ("gain", 0.1, 0.3)]);
    let legacy = reduce_cohort(&cohort, WorstTieBreak::LegacyShortCircuit).expect("summary");
    assert_eq!(legacy.worst.experiment_id.as_str(), "drop");
    assert_close(legacy.worst.improvement, 0.4 / 0.5 - 1.0);

    // equal deltas of -0.25: legacy keeps the first, lexicographic the smaller baseline
    let tied = twins(&[("first", 0.5, 0.25), ("smaller", 0.25, 0.0), ("gain", 0.1, 0.2)]);
    let legacy = reduce_cohort(&tied, WorstTieBreak::LegacyShortCircuit).expect("summary");
    assert_eq!(legacy.worst.experiment_id.as_str(), "first");
    let lexicographic = reduce_cohort(&tied, WorstTieBreak::Lexicographic).expect("summary");
    assert_eq!(lexicographic.worst.experiment_id.as_str(), "smaller");
}

#[test]
fn legacy_worst_takes_negative_baseline() {
    let cohort = twins(&[("drop", 0.5, 0.0), ("negative", -0.5, 0.5)]);
    let legacy = reduce_cohort(&cohort, WorstTieBreak::LegacyShortCircuit).expect("summary");
    assert_eq!(legacy.worst.experiment_id.as_str(), "negative");
}

#[test]
fn averages_agree_on_uniform_cohort() {
    let cohort = twins(&[("1", 0.4, 0.5), ("2", 0.4, 0.5), ("3", 0.4, 0.5)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");
    assert_close(
        summary.average.improvement_from_averages,
        summary.average.improvement_from_individual,
    );
}

#[test]
fn averages_differ_on_mixed_cohort() {
    let cohort = twins(&[("1", 0.1, 0.2), ("2", 0.9, 0.9)]);
    let summary = reduce_cohort(&cohort, WorstTieBreak::Lexicographic).expect("summary");

    assert_close(summary.average.improvement_from_individual, 0.5);
    assert_close(summary.average.improvement_from_averages, 0.1);
    assert!(
        (summary.average.improvement_from_averages - summary.average.improvement_from_individual)
            .abs()
            > EPSILON
    );
}

#[test]
fn pair_by_experiment_drops_incomplete_groups() {
    let mut rows = experiment("ok", 0.1, 0.2);
    rows.push(row("no_optimized", Role::Baseline, 0.3));
    rows.push(row("no_baseline", Role::Optimized, 0.3));
    rows.extend(experiment("dup", 0.1, 0.2));
    rows.push(row("dup", Role::Optimized, 0.4));

    let selected = rows.iter().collect::<Vec<&ResultRow>>();
    let paired = pair_by_experiment(&selected);

    assert_eq!(paired.len(), 1);
    assert!(paired.get(&ExperimentId::new("ok")).is_some());
    assert!(paired.get(&ExperimentId::new("dup")).is_none());
    assert_eq!(
        paired.warnings(),
        &[
            DataQualityWarning::MissingOptimized {
                experiment_id: ExperimentId::new("no_optimized"),
            },
            DataQualityWarning::MissingBaseline {
                experiment_id: ExperimentId::new("no_baseline"),
            },
            DataQualityWarning::DuplicateRole {
                experiment_id: ExperimentId::new("dup"),
                role: Role::Optimized,
                count: 2,
            },
        ]
    );
}

#[test]
fn pair_by_experiment_rejects_twins_with_different_keys() {
    let mut rows = experiment("x", 0.1, 0.2);
    rows[1].group_key = key("BFGS", "usa_states");

    let selected = rows.iter().collect::<Vec<&ResultRow>>();
    let paired = pair_by_experiment(&selected);

    assert!(paired.twins().is_empty());
    assert_eq!(
        paired.warnings(),
        &[DataQualityWarning::GroupKeyDisagreement {
            experiment_id: ExperimentId::new("x"),
        }]
    );
}

#[test]
fn pair_by_experiment_keeps_first_seen_order() {
    let mut rows = vec![row("b", Role::Optimized, 0.2), row("a", Role::Baseline, 0.1)];
    rows.push(row("a", Role::Optimized, 0.3));
    rows.push(row("b", Role::Baseline, 0.4));

    let selected = rows.iter().collect::<Vec<&ResultRow>>();
    let paired = pair_by_experiment(&selected);
    let ids = paired
        .twins()
        .iter()
        .map(|twin| twin.experiment_id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(paired.twins()[0].baseline_value(), 0.4);
}

#[test]
fn unconstrained_selection_returns_every_row() {
    let mut rows = experiment("1", 0.1, 0.2);
    let mut other = experiment("2", 0.3, 0.4);
    for row in &mut other {
        row.group_key = key("BFGS", "king_of_rome");
        row.status = None;
    }
    rows.extend(other);

    let selected = select_cohort(&rows, &Criteria::default(), &EngineConfig::default());
    assert_eq!(selected.len(), rows.len());
    for row in &rows {
        assert!(selected.contains(&row));
    }
}

#[test]
fn selection_filters_by_exact_field_values() {
    let mut rows = experiment("1", 0.1, 0.2);
    let mut other = experiment("2", 0.3, 0.4);
    for row in &mut other {
        row.group_key = key("BFGS", "usa_states");
    }
    rows.extend(other);

    let criteria = Criteria {
        optim_algo: Some("BFGS".to_string()),
        ..Criteria::default()
    };
    let selected = select_cohort(&rows, &criteria, &EngineConfig::default());
    assert_eq!(selected.len(), 2);
    assert!(selected.iter().all(|row| row.experiment_id.as_str() == "2"));

    let criteria = Criteria {
        optim_algo: Some("bfgs".to_string()),
        ..Criteria::default()
    };
    assert!(select_cohort(&rows, &criteria, &EngineConfig::default()).is_empty());
}

#[test]
fn success_filter_requires_exact_sentinel() {
    let mut rows = experiment("1", 0.1, 0.2);
    rows.extend(experiment("2", 0.3, 0.4));
    rows[2].status = Some("Succeeded".to_string());
    rows[3].status = None;

    let config = EngineConfig {
        success_filter: true,
        ..EngineConfig::default()
    };
    let selected = select_cohort(&rows, &Criteria::default(), &config);
    assert_eq!(selected.len(), 2);
    assert!(selected.iter().all(|row| row.experiment_id.as_str() == "1"));
}

#[test]
fn build_group_summary_is_empty_without_matching_rows() {
    let rows = experiment("1", 0.1, 0.2);
    let criteria = Criteria::exact(&key("CG", "usa_states"));

    let outcome = build_group_summary(&rows, &criteria, &EngineConfig::default());
    assert_eq!(outcome.selected_rows, 0);
    assert!(outcome.summary.is_none());
    assert!(outcome.extremes.is_none());
}

#[test]
fn build_group_summary_is_empty_when_nothing_pairs() {
    let rows = vec![row("1", Role::Optimized, 0.2), row("2", Role::Baseline, 0.3)];
    let outcome = build_group_summary(&rows, &Criteria::default(), &EngineConfig::default());

    assert_eq!(outcome.selected_rows, 2);
    assert!(outcome.summary.is_none());
    assert_eq!(outcome.warnings.len(), 2);
}

#[test]
fn build_group_summary_is_deterministic() {
    let mut rows = Vec::new();
    for (index, (baseline, optimized)) in [(0.3, 0.5), (0.7, 0.2), (0.0, 0.4), (0.3, 0.5)]
        .into_iter()
        .enumerate()
    {
        rows.extend(experiment(&index.to_string(), baseline, optimized));
    }
    let criteria = Criteria::exact(&key("powell", "usa_states"));
    let config = EngineConfig::default();

    let first = build_group_summary(&rows, &criteria, &config);
    let second = build_group_summary(&rows, &criteria, &config);
    assert_eq!(first, second);

    let summary = first.summary.expect("summary");
    let again = second.summary.expect("summary");
    assert_eq!(
        summary.average.improvement_from_individual.to_bits(),
        again.average.improvement_from_individual.to_bits()
    );
    assert_eq!(summary.worst.experiment_id.as_str(), "1");
    assert_eq!(summary.best.experiment_id.as_str(), "2");

    let (worst, best) = first.extremes.expect("extremes");
    assert_eq!(worst.experiment_id.as_str(), "1");
    assert_eq!(best.experiment_id.as_str(), "2");
}

#[test]
fn verify_assertion_accepts_matching_twin() {
    let cohort = twins(&[("1", 0.1, 0.2)]);
    let criteria = Criteria::exact(&key("powell", "usa_states"));
    assert!(verify_assertion(&criteria, &cohort[0]).is_ok());
    assert!(verify_assertion(&Criteria::default(), &cohort[0]).is_ok());
}

#[test]
fn verify_assertion_reports_first_disagreeing_field() {
    let cohort = twins(&[("7", 0.1, 0.2)]);
    let criteria = Criteria::exact(&key("powell", "king_of_rome"));

    let mismatch = verify_assertion(&criteria, &cohort[0]).expect_err("mismatch");
    assert_eq!(mismatch.field, "ground_truth_name");
    assert_eq!(mismatch.asserted, "king_of_rome");
    assert_eq!(mismatch.actual, "usa_states");
    assert_eq!(mismatch.experiment_id.as_str(), "7");
    assert!(mismatch.to_string().contains("ground_truth_name"));
}
