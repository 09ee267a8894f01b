use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::config::load_report_config;
use crate::model::{IngestCounts, IngestPaths, IngestRunManifest, Role, SourceEntry};
use crate::store::{DB_SCHEMA_VERSION, count_rows, open_store, replace_results};
use crate::table::{DEFAULT_DELIMITER, IngestIssueKind, ResultTable};
use crate::util::{
    ensure_directory, now_utc_string, read_text_file, sha256_file, utc_compact_string,
    write_json_pretty,
};

const MAX_MANIFEST_WARNINGS: usize = 200;

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("ingest-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = resolve_db_path(&cache_root, args.db_path.as_deref());

    info!(
        results = %args.results_path.display(),
        run_id = %run_id,
        "starting ingest"
    );

    let config = load_report_config(args.config.as_deref())?;
    let text = read_text_file(&args.results_path)?;
    let source_sha256 = sha256_file(&args.results_path)?;
    let table = ResultTable::from_delimited(&text, &config.columns, args.delimiter)?;

    for issue in table
        .issues
        .iter()
        .filter(|issue| issue.kind == IngestIssueKind::Rejected)
    {
        warn!(line = issue.line, detail = %issue.detail, "rejected result row");
    }

    let source_path = args.results_path.display().to_string();
    let mut connection = open_store(&db_path)?;
    let rows_inserted = replace_results(
        &mut connection,
        &table.rows,
        &table.source_lines,
        &source_path,
        &source_sha256,
    )?;
    let results_total = count_rows(&connection, "SELECT COUNT(*) FROM results")?;

    let skipped_role_rows = table.count_issues(IngestIssueKind::UnpairedRole);
    let rejected_rows = table.count_issues(IngestIssueKind::Rejected);
    let baseline_rows = table
        .rows
        .iter()
        .filter(|row| row.role == Role::Baseline)
        .count();

    let warnings = table
        .issues
        .iter()
        .filter(|issue| issue.kind == IngestIssueKind::Rejected)
        .take(MAX_MANIFEST_WARNINGS)
        .map(|issue| format!("line {}: {}", issue.line, issue.detail))
        .collect::<Vec<String>>();

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        source: SourceEntry {
            path: source_path,
            sha256: source_sha256,
            line_count: table.data_line_count,
        },
        counts: IngestCounts {
            data_line_count: table.data_line_count,
            rows_inserted,
            baseline_rows,
            optimized_rows: rows_inserted - baseline_rows,
            skipped_role_rows,
            rejected_rows,
            results_total,
        },
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        rows = rows_inserted,
        skipped_roles = skipped_role_rows,
        rejected = rejected_rows,
        "ingest completed"
    );

    Ok(())
}

pub fn resolve_db_path(cache_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join("optimum_results.sqlite"))
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut parts = vec![
        "optimum-cases ingest".to_string(),
        format!("--cache-root {}", args.cache_root.display()),
        format!("--results-path {}", args.results_path.display()),
    ];

    if let Some(path) = &args.db_path {
        parts.push(format!("--db-path {}", path.display()));
    }
    if let Some(path) = &args.config {
        parts.push(format!("--config {}", path.display()));
    }
    if args.delimiter != DEFAULT_DELIMITER {
        parts.push(format!("--delimiter {}", args.delimiter));
    }

    parts.join(" ")
}
