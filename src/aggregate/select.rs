use serde::Serialize;

use crate::config::EngineConfig;
use crate::model::{GroupKey, ResultRow};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Criteria {
    pub objective_metric: Option<String>,
    pub optim_algo: Option<String>,
    pub we_model: Option<String>,
    pub ground_truth_name: Option<String>,
}

impl Criteria {
    pub fn exact(key: &GroupKey) -> Self {
        Self {
            objective_metric: Some(key.objective_metric.clone()),
            optim_algo: Some(key.optim_algo.clone()),
            we_model: Some(key.we_model.clone()),
            ground_truth_name: Some(key.ground_truth_name.clone()),
        }
    }

    pub(crate) fn constrained_fields<'a>(
        &'a self,
        key: &'a GroupKey,
    ) -> impl Iterator<Item = (&'static str, &'a str, &'a str)> + 'a {
        [
            (
                "objective_metric",
                self.objective_metric.as_deref(),
                key.objective_metric.as_str(),
            ),
            (
                "optim_algo",
                self.optim_algo.as_deref(),
                key.optim_algo.as_str(),
            ),
            ("we_model", self.we_model.as_deref(), key.we_model.as_str()),
            (
                "ground_truth_name",
                self.ground_truth_name.as_deref(),
                key.ground_truth_name.as_str(),
            ),
        ]
        .into_iter()
        .filter_map(|(field, asserted, actual)| asserted.map(|value| (field, value, actual)))
    }

    pub fn matches(&self, key: &GroupKey) -> bool {
        self.constrained_fields(key)
            .all(|(_, asserted, actual)| asserted == actual)
    }
}

pub fn select_cohort<'a>(
    table: &'a [ResultRow],
    criteria: &Criteria,
    config: &EngineConfig,
) -> Vec<&'a ResultRow> {
    table
        .iter()
        .filter(|row| criteria.matches(&row.group_key))
        .filter(|row| !config.success_filter || is_success(row, &config.success_sentinel))
        .collect()
}

fn is_success(row: &ResultRow, sentinel: &str) -> bool {
    row.status.as_deref() == Some(sentinel)
}
