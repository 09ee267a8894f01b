use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Baseline,
    Optimized,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Optimized => "optimized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "baseline" => Some(Self::Baseline),
            "optimized" => Some(Self::Optimized),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl ExperimentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub objective_metric: String,
    pub optim_algo: String,
    pub we_model: String,
    pub ground_truth_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub role: Role,
    pub experiment_id: ExperimentId,
    pub group_key: GroupKey,
    pub metric_value: f64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub path: String,
    pub sha256: String,
    pub line_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestCounts {
    pub data_line_count: usize,
    pub rows_inserted: usize,
    pub baseline_rows: usize,
    pub optimized_rows: usize,
    pub skipped_role_rows: usize,
    pub rejected_rows: usize,
    pub results_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: IngestPaths,
    pub source: SourceEntry,
    pub counts: IngestCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPaths {
    pub table_source: String,
    pub output_path: String,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportCounts {
    pub combinations_total: usize,
    pub emitted: usize,
    pub skipped_empty: usize,
    pub errored: usize,
    pub data_quality_warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub success_filter: bool,
    pub worst_tie_break: String,
    pub paths: ReportPaths,
    pub counts: ReportCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestHeader {
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub updated_at: Option<String>,
    pub command: Option<String>,
}
