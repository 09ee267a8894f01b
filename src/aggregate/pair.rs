use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::model::{ExperimentId, ResultRow, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentTwin {
    pub experiment_id: ExperimentId,
    pub baseline: ResultRow,
    pub optimized: ResultRow,
}

impl ExperimentTwin {
    pub fn baseline_value(&self) -> f64 {
        self.baseline.metric_value
    }

    pub fn optimized_value(&self) -> f64 {
        self.optimized.metric_value
    }

    pub fn delta(&self) -> f64 {
        self.optimized_value() - self.baseline_value()
    }

    pub fn improvement(&self) -> f64 {
        super::improvement(self.baseline_value(), self.optimized_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    MissingBaseline {
        experiment_id: ExperimentId,
    },
    MissingOptimized {
        experiment_id: ExperimentId,
    },
    DuplicateRole {
        experiment_id: ExperimentId,
        role: Role,
        count: usize,
    },
    GroupKeyDisagreement {
        experiment_id: ExperimentId,
    },
}

impl DataQualityWarning {
    pub fn experiment_id(&self) -> &ExperimentId {
        match self {
            Self::MissingBaseline { experiment_id }
            | Self::MissingOptimized { experiment_id }
            | Self::DuplicateRole { experiment_id, .. }
            | Self::GroupKeyDisagreement { experiment_id } => experiment_id,
        }
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaseline { experiment_id } => {
                write!(f, "experiment {experiment_id} has no baseline row")
            }
            Self::MissingOptimized { experiment_id } => {
                write!(f, "experiment {experiment_id} has no optimized row")
            }
            Self::DuplicateRole {
                experiment_id,
                role,
                count,
            } => write!(
                f,
                "experiment {experiment_id} has {count} {} rows",
                role.as_str()
            ),
            Self::GroupKeyDisagreement { experiment_id } => write!(
                f,
                "experiment {experiment_id} baseline and optimized rows carry different group keys"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PairedExperiments {
    twins: Vec<ExperimentTwin>,
    index: HashMap<ExperimentId, usize>,
    warnings: Vec<DataQualityWarning>,
}

impl PairedExperiments {
    pub fn get(&self, experiment_id: &ExperimentId) -> Option<&ExperimentTwin> {
        self.index
            .get(experiment_id)
            .and_then(|position| self.twins.get(*position))
    }

    pub fn twins(&self) -> &[ExperimentTwin] {
        &self.twins
    }

    pub fn len(&self) -> usize {
        self.twins.len()
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }

    pub fn into_parts(self) -> (Vec<ExperimentTwin>, Vec<DataQualityWarning>) {
        (self.twins, self.warnings)
    }
}

#[derive(Default)]
struct RoleBucket<'a> {
    baseline: Vec<&'a ResultRow>,
    optimized: Vec<&'a ResultRow>,
}

pub fn pair_by_experiment(rows: &[&ResultRow]) -> PairedExperiments {
    let mut order = Vec::<&ExperimentId>::new();
    let mut buckets = HashMap::<&ExperimentId, RoleBucket>::new();

    for row in rows.iter().copied() {
        let bucket = buckets.entry(&row.experiment_id).or_insert_with(|| {
            order.push(&row.experiment_id);
            RoleBucket::default()
        });
        match row.role {
            Role::Baseline => bucket.baseline.push(row),
            Role::Optimized => bucket.optimized.push(row),
        }
    }

    let mut paired = PairedExperiments::default();
    for experiment_id in order {
        let Some(bucket) = buckets.remove(experiment_id) else {
            continue;
        };

        match twin_from_bucket(experiment_id, bucket) {
            Ok(twin) => {
                paired
                    .index
                    .insert(twin.experiment_id.clone(), paired.twins.len());
                paired.twins.push(twin);
            }
            Err(issue) => {
                warn!(
                    experiment_id = %issue.experiment_id(),
                    issue = %issue,
                    "dropping malformed experiment"
                );
                paired.warnings.push(issue);
            }
        }
    }

    paired
}

fn twin_from_bucket(
    experiment_id: &ExperimentId,
    bucket: RoleBucket<'_>,
) -> Result<ExperimentTwin, DataQualityWarning> {
    let baseline = single_row(experiment_id, Role::Baseline, &bucket.baseline)?;
    let optimized = single_row(experiment_id, Role::Optimized, &bucket.optimized)?;

    if baseline.group_key != optimized.group_key {
        return Err(DataQualityWarning::GroupKeyDisagreement {
            experiment_id: experiment_id.clone(),
        });
    }

    Ok(ExperimentTwin {
        experiment_id: experiment_id.clone(),
        baseline: baseline.clone(),
        optimized: optimized.clone(),
    })
}

fn single_row<'a>(
    experiment_id: &ExperimentId,
    role: Role,
    rows: &[&'a ResultRow],
) -> Result<&'a ResultRow, DataQualityWarning> {
    match rows {
        [row] => Ok(*row),
        [] => Err(match role {
            Role::Baseline => DataQualityWarning::MissingBaseline {
                experiment_id: experiment_id.clone(),
            },
            Role::Optimized => DataQualityWarning::MissingOptimized {
                experiment_id: experiment_id.clone(),
            },
        }),
        _ => Err(DataQualityWarning::DuplicateRole {
            experiment_id: experiment_id.clone(),
            role,
            count: rows.len(),
        }),
    }
}
