use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::config::ColumnLayout;
use crate::model::{ExperimentId, GroupKey, ResultRow, Role};

pub const DEFAULT_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestIssue {
    pub line: usize,
    pub kind: IngestIssueKind,
    pub detail: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestIssueKind {
    UnpairedRole,
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
    pub source_lines: Vec<usize>,
    pub issues: Vec<IngestIssue>,
    pub data_line_count: usize,
}

impl ResultTable {
    pub fn from_delimited(text: &str, layout: &ColumnLayout, delimiter: char) -> Result<Self> {
        let records = parse_delimited(text, delimiter);
        let mut records = records.into_iter();

        let Some((_, header)) = records.next() else {
            bail!("results table is empty");
        };
        let columns = ColumnIndexes::resolve(&header, layout)?;

        let mut table = ResultTable::default();
        for (line, record) in records {
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            table.data_line_count += 1;

            match columns.read_row(&record, layout) {
                Ok(row) => {
                    table.rows.push(row);
                    table.source_lines.push(line);
                }
                Err((kind, detail)) => table.issues.push(IngestIssue { line, kind, detail }),
            }
        }

        Ok(table)
    }

    pub fn count_issues(&self, kind: IngestIssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }
}

struct ColumnIndexes {
    role: usize,
    experiment_id: usize,
    objective_metric: usize,
    metric_value: usize,
    optim_algo: usize,
    we_model: usize,
    ground_truth_name: usize,
    status: Option<usize>,
}

impl ColumnIndexes {
    fn resolve(header: &[String], layout: &ColumnLayout) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            header
                .iter()
                .position(|cell| cell.trim() == name)
                .with_context(|| format!("results header is missing column {name:?}"))
        };

        Ok(Self {
            role: find(&layout.role)?,
            experiment_id: find(&layout.experiment_id)?,
            objective_metric: find(&layout.objective_metric)?,
            metric_value: find(&layout.metric_value)?,
            optim_algo: find(&layout.optim_algo)?,
            we_model: find(&layout.we_model)?,
            ground_truth_name: find(&layout.ground_truth_name)?,
            status: layout.status.as_deref().map(find).transpose()?,
        })
    }

    fn read_row(
        &self,
        record: &[String],
        layout: &ColumnLayout,
    ) -> std::result::Result<ResultRow, (IngestIssueKind, String)> {
        let cell = |index: usize| record.get(index).map(|value| value.trim()).unwrap_or("");

        let role_label = cell(self.role);
        let role = if role_label == layout.baseline_label {
            Role::Baseline
        } else if role_label == layout.optimized_label {
            Role::Optimized
        } else {
            return Err((
                IngestIssueKind::UnpairedRole,
                format!("role label {role_label:?} is not a pair endpoint"),
            ));
        };

        let experiment_id = cell(self.experiment_id);
        if experiment_id.is_empty() {
            return Err((
                IngestIssueKind::Rejected,
                "experiment id is empty".to_string(),
            ));
        }

        let raw_value = cell(self.metric_value);
        let metric_value = parse_metric_value(raw_value).ok_or_else(|| {
            (
                IngestIssueKind::Rejected,
                format!("metric value {raw_value:?} is not a finite number"),
            )
        })?;

        Ok(ResultRow {
            role,
            experiment_id: ExperimentId::new(experiment_id),
            group_key: GroupKey {
                objective_metric: cell(self.objective_metric).to_string(),
                optim_algo: cell(self.optim_algo).to_string(),
                we_model: cell(self.we_model).to_string(),
                ground_truth_name: cell(self.ground_truth_name).to_string(),
            },
            metric_value,
            status: self
                .status
                .map(cell)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
        })
    }
}

pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_delimited(text: &str, delimiter: char) -> Vec<(usize, Vec<String>)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut record = Vec::<String>::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(character) = chars.next() {
        if in_quotes {
            match character {
                '"' if chars.peek() == Some(&'"') => {
                    cell.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    cell.push(character);
                }
                _ => cell.push(character),
            }
            continue;
        }

        match character {
            '"' if cell.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut cell));
                records.push((record_line, std::mem::take(&mut record)));
                line += 1;
                record_line = line;
            }
            value if value == delimiter => record.push(std::mem::take(&mut cell)),
            _ => cell.push(character),
        }
    }

    if !cell.is_empty() || !record.is_empty() {
        record.push(cell);
        records.push((record_line, record));
    }

    records
}

pub fn render_delimited(rows: &[Vec<String>], delimiter: char) -> String {
    let mut out = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| escape_cell(cell, delimiter))
                .collect::<Vec<String>>()
                .join(&delimiter.to_string())
        })
        .collect::<Vec<String>>()
        .join("\n");
    out.push('\n');
    out
}

fn escape_cell(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
