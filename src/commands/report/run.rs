use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::rows::{
    CombinationOutcome, enumerate_combinations, error_cells, header_cells, summary_cells,
};
use crate::aggregate::{
    ConfigurationMismatch, Criteria, GroupSummary, build_group_summary, verify_assertion,
};
use crate::cli::ReportArgs;
use crate::commands::ingest::resolve_db_path;
use crate::config::{ReportConfig, load_report_config};
use crate::model::{GroupKey, ReportCounts, ReportPaths, ReportRunManifest, ResultRow};
use crate::store::{insert_summary_rows, load_results, open_store};
use crate::table::{ResultTable, render_delimited};
use crate::util::{
    ensure_directory, now_utc_string, read_text_file, utc_compact_string, write_json_pretty,
    write_text_file,
};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CombinationRecord {
    pub key: GroupKey,
    pub model_label: String,
    pub outcome: CombinationOutcome,
    pub selected_rows: usize,
    pub summary: Option<GroupSummary>,
    pub mismatch: Option<ConfigurationMismatch>,
}

#[derive(Debug, Default)]
pub(crate) struct ReportOutcome {
    pub rows: Vec<(String, Vec<String>)>,
    pub records: Vec<CombinationRecord>,
    pub counts: ReportCounts,
    pub warnings: Vec<String>,
}

struct LoadedTable {
    rows: Vec<ResultRow>,
    source: String,
    db_path: Option<PathBuf>,
}

pub fn run(args: ReportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("report-{}", utc_compact_string(started_ts));

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let report_manifest_path = args.report_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "report_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let output_path = args.output_path.clone().unwrap_or_else(|| {
        args.cache_root.join("reports").join(format!(
            "worst_best_cases_{}.csv",
            utc_compact_string(started_ts)
        ))
    });

    let mut config = load_report_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    info!(
        run_id = %run_id,
        success_filter = config.engine.success_filter,
        worst_tie_break = config.engine.worst_tie_break.as_str(),
        "starting report"
    );

    let table = load_table(&args, &config)?;
    let combinations = enumerate_combinations(&config);
    let outcome = build_report(&table.rows, &config, &combinations, &started_at);

    let mut lines = Vec::with_capacity(outcome.rows.len() + 1);
    lines.push(header_cells());
    lines.extend(outcome.rows.iter().map(|(_, cells)| cells.clone()));
    write_text_file(&output_path, &render_delimited(&lines, args.delimiter))?;
    info!(path = %output_path.display(), rows = outcome.rows.len(), "wrote summary table");

    if let Some(db_path) = &table.db_path {
        let mut connection = open_store(db_path)?;
        let stored = insert_summary_rows(&mut connection, &run_id, &outcome.rows)?;
        info!(path = %db_path.display(), rows = stored, "stored summary rows");
    }

    let manifest = ReportRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_report_command(&args),
        success_filter: config.engine.success_filter,
        worst_tie_break: config.engine.worst_tie_break.as_str().to_string(),
        paths: ReportPaths {
            table_source: table.source,
            output_path: output_path.display().to_string(),
            db_path: table.db_path.map(|path| path.display().to_string()),
        },
        counts: outcome.counts.clone(),
        warnings: outcome.warnings.clone(),
    };
    write_json_pretty(&report_manifest_path, &manifest)?;
    info!(path = %report_manifest_path.display(), "wrote report run manifest");

    if args.json {
        write_json_records(&outcome.records)?;
    }

    info!(
        total = outcome.counts.combinations_total,
        emitted = outcome.counts.emitted,
        skipped_empty = outcome.counts.skipped_empty,
        errored = outcome.counts.errored,
        data_quality_warnings = outcome.counts.data_quality_warnings,
        "report completed"
    );

    Ok(())
}

pub(crate) fn build_report(
    table: &[ResultRow],
    config: &ReportConfig,
    combinations: &[GroupKey],
    timestamp: &str,
) -> ReportOutcome {
    let mut outcome = ReportOutcome {
        counts: ReportCounts {
            combinations_total: combinations.len(),
            ..ReportCounts::default()
        },
        ..ReportOutcome::default()
    };

    for (index, key) in combinations.iter().enumerate() {
        info!(
            remaining = combinations.len() - index,
            optim_algo = %key.optim_algo,
            objective_metric = %key.objective_metric,
            we_model = %key.we_model,
            ground_truth_name = %key.ground_truth_name,
            "summarising combination"
        );

        let criteria = Criteria::exact(key);
        let result = build_group_summary(table, &criteria, &config.engine);

        outcome.counts.data_quality_warnings += result.warnings.len();
        outcome.warnings.extend(result.warnings.iter().map(|warning| {
            format!(
                "{}/{}/{}/{}: {warning}",
                key.optim_algo, key.objective_metric, key.we_model, key.ground_truth_name
            )
        }));

        let mismatch = result.extremes.as_ref().and_then(|(worst, best)| {
            verify_assertion(&criteria, worst)
                .and_then(|_| verify_assertion(&criteria, best))
                .err()
        });

        let record_outcome = match (&result.summary, &mismatch) {
            (None, _) => {
                info!(selected_rows = result.selected_rows, "no data for combination");
                outcome.counts.skipped_empty += 1;
                CombinationOutcome::SkippedEmpty
            }
            (Some(_), Some(mismatch)) => {
                error!(mismatch = %mismatch, "criteria and row values disagree");
                outcome.rows.push((
                    CombinationOutcome::Errored.as_str().to_string(),
                    error_cells(timestamp, mismatch),
                ));
                outcome.counts.errored += 1;
                CombinationOutcome::Errored
            }
            (Some(summary), None) => {
                outcome.rows.push((
                    CombinationOutcome::Emitted.as_str().to_string(),
                    summary_cells(timestamp, key, summary, config),
                ));
                outcome.counts.emitted += 1;
                CombinationOutcome::Emitted
            }
        };

        if record_outcome != CombinationOutcome::SkippedEmpty {
            outcome.records.push(CombinationRecord {
                key: key.clone(),
                model_label: config.model_label(&key.we_model).to_string(),
                outcome: record_outcome,
                selected_rows: result.selected_rows,
                summary: result.summary,
                mismatch,
            });
        }
    }

    outcome
}

fn apply_overrides(config: &mut ReportConfig, args: &ReportArgs) {
    if args.success_only {
        config.engine.success_filter = true;
    }
    if let Some(mode) = args.worst_tie_break {
        config.engine.worst_tie_break = mode.into_tie_break();
    }
    if !args.objective_metrics.is_empty() {
        config.objective_metrics = args.objective_metrics.clone();
    }
    if !args.optim_algos.is_empty() {
        config.optim_algos = args.optim_algos.clone();
    }
    if !args.we_models.is_empty() {
        config.we_models = args.we_models.clone();
    }
    if !args.ground_truth_names.is_empty() {
        config.ground_truth_names = args.ground_truth_names.clone();
    }
}

fn load_table(args: &ReportArgs, config: &ReportConfig) -> Result<LoadedTable> {
    if let Some(results_path) = &args.results_path {
        let text = read_text_file(results_path)?;
        let table = ResultTable::from_delimited(&text, &config.columns, args.delimiter)
            .with_context(|| format!("failed to read results table {}", results_path.display()))?;
        if !table.issues.is_empty() {
            warn!(
                path = %results_path.display(),
                skipped = table.issues.len(),
                "some result lines were not usable"
            );
        }
        info!(path = %results_path.display(), rows = table.rows.len(), "loaded results file");
        return Ok(LoadedTable {
            rows: table.rows,
            source: results_path.display().to_string(),
            db_path: None,
        });
    }

    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());
    if !db_path.exists() {
        bail!(
            "results store {} does not exist; run ingest first or pass --results-path",
            db_path.display()
        );
    }

    let connection = open_store(&db_path)?;
    let rows = load_results(&connection)?;
    info!(path = %db_path.display(), rows = rows.len(), "loaded results store");

    Ok(LoadedTable {
        rows,
        source: db_path.display().to_string(),
        db_path: Some(db_path),
    })
}

fn write_json_records(records: &[CombinationRecord]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, records)
        .context("failed to serialize report json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn render_report_command(args: &ReportArgs) -> String {
    let mut parts = vec![
        "optimum-cases report".to_string(),
        format!("--cache-root {}", args.cache_root.display()),
    ];

    let paths: [(&str, Option<&Path>); 4] = [
        ("--db-path", args.db_path.as_deref()),
        ("--results-path", args.results_path.as_deref()),
        ("--config", args.config.as_deref()),
        ("--output-path", args.output_path.as_deref()),
    ];
    for (flag, path) in paths
        .into_iter()
        .filter_map(|(flag, path)| path.map(|path| (flag, path)))
    {
        parts.push(format!("{flag} {}", path.display()));
    }

    if args.success_only {
        parts.push("--success-only".to_string());
    }
    if let Some(mode) = args.worst_tie_break {
        parts.push(format!("--worst-tie-break {}", mode.as_str()));
    }

    let lists = [
        ("--metric", &args.objective_metrics),
        ("--algo", &args.optim_algos),
        ("--model", &args.we_models),
        ("--ground-truth", &args.ground_truth_names),
    ];
    for (flag, values) in lists {
        for value in values {
            parts.push(format!("{flag} {value}"));
        }
    }

    parts.join(" ")
}
