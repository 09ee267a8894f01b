use serde::{Deserialize, Serialize};

use super::pair::ExperimentTwin;
use crate::model::ExperimentId;

/// Relative change of `optimized` over `baseline`, defined as 0 for a zero baseline.
pub fn improvement(baseline: f64, optimized: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        optimized / baseline - 1.0
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorstTieBreak {
    #[default]
    Lexicographic,
    /// Strict minimum delta, first twin wins ties. The baseline clause only
    /// fires for a negative baseline.
    LegacyShortCircuit,
}

impl WorstTieBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexicographic => "lexicographic",
            Self::LegacyShortCircuit => "legacy_short_circuit",
        }
    }

    fn replaces(self, candidate: &ExperimentTwin, current: &ExperimentTwin) -> bool {
        let (delta, current_delta) = (candidate.delta(), current.delta());
        let baseline = candidate.baseline_value();
        match self {
            Self::Lexicographic => {
                delta < current_delta
                    || (delta == current_delta && baseline < current.baseline_value())
            }
            // running worst baseline is never recorded, so it compares against zero
            Self::LegacyShortCircuit => delta < current_delta || baseline < 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwinOutcome {
    pub experiment_id: ExperimentId,
    pub baseline_value: f64,
    pub optimized_value: f64,
    pub improvement: f64,
}

impl From<&ExperimentTwin> for TwinOutcome {
    fn from(twin: &ExperimentTwin) -> Self {
        Self {
            experiment_id: twin.experiment_id.clone(),
            baseline_value: twin.baseline_value(),
            optimized_value: twin.optimized_value(),
            improvement: twin.improvement(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageOutcome {
    pub baseline_value: f64,
    pub optimized_value: f64,
    /// Improvement of the mean optimized value over the mean baseline value.
    pub improvement_from_averages: f64,
    /// Mean of the per-twin improvements.
    pub improvement_from_individual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub worst: TwinOutcome,
    pub average: AverageOutcome,
    pub best: TwinOutcome,
    pub cohort_size: usize,
}

pub fn reduce_cohort(twins: &[ExperimentTwin], tie_break: WorstTieBreak) -> Option<GroupSummary> {
    let (first, rest) = twins.split_first()?;

    let mut worst = first;
    let mut best = first;
    let mut baseline_total = first.baseline_value();
    let mut optimized_total = first.optimized_value();
    let mut improvement_total = first.improvement();

    for twin in rest {
        if tie_break.replaces(twin, worst) {
            worst = twin;
        }
        // later twins win ties
        if twin.delta() >= best.delta() {
            best = twin;
        }
        baseline_total += twin.baseline_value();
        optimized_total += twin.optimized_value();
        improvement_total += twin.improvement();
    }

    let count = twins.len() as f64;
    let baseline_mean = baseline_total / count;
    let optimized_mean = optimized_total / count;

    Some(GroupSummary {
        worst: TwinOutcome::from(worst),
        average: AverageOutcome {
            baseline_value: baseline_mean,
            optimized_value: optimized_mean,
            improvement_from_averages: improvement(baseline_mean, optimized_mean),
            improvement_from_individual: improvement_total / count,
        },
        best: TwinOutcome::from(best),
        cohort_size: twins.len(),
    })
}
