mod pair;
mod reduce;
mod select;
#[cfg(test)]
mod tests;
mod verify;

use serde::Serialize;
use tracing::debug;

pub use pair::{DataQualityWarning, ExperimentTwin, pair_by_experiment};
pub use reduce::{GroupSummary, WorstTieBreak, improvement, reduce_cohort};
pub use select::{Criteria, select_cohort};
pub use verify::{ConfigurationMismatch, verify_assertion};

use crate::config::EngineConfig;
use crate::model::ResultRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummaryOutcome {
    pub selected_rows: usize,
    pub summary: Option<GroupSummary>,
    pub warnings: Vec<DataQualityWarning>,
    #[serde(skip)]
    pub extremes: Option<(ExperimentTwin, ExperimentTwin)>,
}

pub fn build_group_summary(
    table: &[ResultRow],
    criteria: &Criteria,
    config: &EngineConfig,
) -> GroupSummaryOutcome {
    let selected = select_cohort(table, criteria, config);
    let selected_rows = selected.len();
    let paired = pair_by_experiment(&selected);
    debug!(
        selected_rows,
        twins = paired.len(),
        dropped = paired.warnings().len(),
        "paired cohort"
    );

    let summary = reduce_cohort(paired.twins(), config.worst_tie_break);
    let extremes = summary.as_ref().and_then(|summary| {
        let worst = paired.get(&summary.worst.experiment_id)?;
        let best = paired.get(&summary.best.experiment_id)?;
        Some((worst.clone(), best.clone()))
    });

    let (_, warnings) = paired.into_parts();
    GroupSummaryOutcome {
        selected_rows,
        summary,
        warnings,
        extremes,
    }
}
