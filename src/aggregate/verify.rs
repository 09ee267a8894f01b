use std::fmt;

use serde::Serialize;

use super::pair::ExperimentTwin;
use super::select::Criteria;
use crate::model::ExperimentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationMismatch {
    pub experiment_id: ExperimentId,
    pub field: &'static str,
    pub asserted: String,
    pub actual: String,
}

impl fmt::Display for ConfigurationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "experiment {} has {}={:?} but was reported under {}={:?}",
            self.experiment_id, self.field, self.actual, self.field, self.asserted
        )
    }
}

pub fn verify_assertion(
    asserted: &Criteria,
    twin: &ExperimentTwin,
) -> Result<(), ConfigurationMismatch> {
    for row in [&twin.baseline, &twin.optimized] {
        let mismatch = asserted
            .constrained_fields(&row.group_key)
            .find(|(_, expected, actual)| expected != actual);

        if let Some((field, expected, actual)) = mismatch {
            return Err(ConfigurationMismatch {
                experiment_id: twin.experiment_id.clone(),
                field,
                asserted: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    Ok(())
}
