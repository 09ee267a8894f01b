use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::WorstTieBreak;
use crate::util::read_text_file;

pub const DEFAULT_SUCCESS_SENTINEL: &str = "succeeded";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub role: String,
    pub experiment_id: String,
    pub objective_metric: String,
    pub metric_value: String,
    pub optim_algo: String,
    pub we_model: String,
    pub ground_truth_name: String,
    pub status: Option<String>,
    pub baseline_label: String,
    pub optimized_label: String,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            role: "INFO".to_string(),
            experiment_id: "exp_id".to_string(),
            objective_metric: "objective_metric".to_string(),
            metric_value: "objective_metric_result".to_string(),
            optim_algo: "optim_algo".to_string(),
            we_model: "we_model".to_string(),
            ground_truth_name: "ground_truth_name".to_string(),
            status: None,
            baseline_label: "CENTROID".to_string(),
            optimized_label: "OPTIMIZED".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub success_filter: bool,
    pub success_sentinel: String,
    pub worst_tie_break: WorstTieBreak,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            success_filter: false,
            success_sentinel: DEFAULT_SUCCESS_SENTINEL.to_string(),
            worst_tie_break: WorstTieBreak::Lexicographic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub columns: ColumnLayout,
    pub engine: EngineConfig,
    pub objective_metrics: Vec<String>,
    pub optim_algos: Vec<String>,
    pub we_models: Vec<String>,
    pub ground_truth_names: Vec<String>,
    pub model_labels: BTreeMap<String, String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            columns: ColumnLayout::default(),
            engine: EngineConfig::default(),
            objective_metrics: strings(&["AP@k"]),
            optim_algos: strings(&[
                "BFGS",
                "CG",
                "Newton-CG",
                "SLSQP",
                "TNC",
                "dogleg",
                "nelder-mead",
                "powell",
                "trust-ncg",
                "COBYLA",
            ]),
            we_models: strings(&[
                "models/GoogleNews-vectors-negative300.magnitude",
                "models/glove.840B.300d.magnitude",
            ]),
            ground_truth_names: strings(&[
                "usa_states",
                "universe_solar_planets",
                "king_of_rome",
                "period_7_element",
            ]),
            model_labels: [
                (
                    "models/GoogleNews-vectors-negative300.magnitude",
                    "GoogleNews 300d",
                ),
                ("models/glove.840B.300d.magnitude", "GloVe 840B 300d"),
            ]
            .into_iter()
            .map(|(id, label)| (id.to_string(), label.to_string()))
            .collect(),
        }
    }
}

impl ReportConfig {
    pub fn model_label<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.model_labels
            .get(model_id)
            .map(String::as_str)
            .unwrap_or(model_id)
    }
}

pub fn load_report_config(path: Option<&Path>) -> Result<ReportConfig> {
    let Some(path) = path else {
        return Ok(ReportConfig::default());
    };

    let raw = read_text_file(path)?;
    let config: ReportConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    info!(
        path = %path.display(),
        metrics = config.objective_metrics.len(),
        algos = config.optim_algos.len(),
        models = config.we_models.len(),
        ground_truths = config.ground_truth_names.len(),
        "loaded report config"
    );

    Ok(config)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
