use serde::Serialize;

use crate::aggregate::{ConfigurationMismatch, GroupSummary};
use crate::config::ReportConfig;
use crate::model::GroupKey;

pub(crate) const OUTPUT_COLUMNS: [&str; 18] = [
    "timestamp",
    "cohort_size",
    "optim_algo",
    "worst_baseline",
    "worst_optimized",
    "worst_improvement",
    "average_baseline",
    "average_optimized",
    "average_improvement_from_averages",
    "average_improvement_from_individual",
    "best_baseline",
    "best_optimized",
    "best_improvement",
    "ground_truth_name",
    "model_label",
    "objective_metric",
    "worst_experiment_id",
    "best_experiment_id",
];

pub(crate) const ERROR_MARKER: &str = "ERROR";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CombinationOutcome {
    Emitted,
    SkippedEmpty,
    Errored,
}

impl CombinationOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Emitted => "emitted",
            Self::SkippedEmpty => "skipped_empty",
            Self::Errored => "errored",
        }
    }
}

pub(crate) fn enumerate_combinations(config: &ReportConfig) -> Vec<GroupKey> {
    let mut combinations = Vec::with_capacity(
        config.optim_algos.len()
            * config.objective_metrics.len()
            * config.we_models.len()
            * config.ground_truth_names.len(),
    );

    for optim_algo in &config.optim_algos {
        for objective_metric in &config.objective_metrics {
            for we_model in &config.we_models {
                for ground_truth_name in &config.ground_truth_names {
                    combinations.push(GroupKey {
                        objective_metric: objective_metric.clone(),
                        optim_algo: optim_algo.clone(),
                        we_model: we_model.clone(),
                        ground_truth_name: ground_truth_name.clone(),
                    });
                }
            }
        }
    }

    combinations
}

pub(crate) fn summary_cells(
    timestamp: &str,
    key: &GroupKey,
    summary: &GroupSummary,
    config: &ReportConfig,
) -> Vec<String> {
    vec![
        timestamp.to_string(),
        summary.cohort_size.to_string(),
        key.optim_algo.clone(),
        format_number(summary.worst.baseline_value),
        format_number(summary.worst.optimized_value),
        format_number(summary.worst.improvement),
        format_number(summary.average.baseline_value),
        format_number(summary.average.optimized_value),
        format_number(summary.average.improvement_from_averages),
        format_number(summary.average.improvement_from_individual),
        format_number(summary.best.baseline_value),
        format_number(summary.best.optimized_value),
        format_number(summary.best.improvement),
        key.ground_truth_name.clone(),
        config.model_label(&key.we_model).to_string(),
        key.objective_metric.clone(),
        summary.worst.experiment_id.to_string(),
        summary.best.experiment_id.to_string(),
    ]
}

pub(crate) fn error_cells(timestamp: &str, mismatch: &ConfigurationMismatch) -> Vec<String> {
    let mut cells = vec![
        ERROR_MARKER.to_string(),
        format!("criteria and row values must agree: {mismatch} ({timestamp})"),
    ];
    cells.resize(OUTPUT_COLUMNS.len(), String::new());
    cells
}

pub(crate) fn header_cells() -> Vec<String> {
    OUTPUT_COLUMNS.iter().map(|name| name.to_string()).collect()
}

fn format_number(value: f64) -> String {
    value.to_string()
}
