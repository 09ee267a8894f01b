use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::resolve_db_path;
use crate::model::ManifestHeader;
use crate::store::count_rows;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());

    info!(cache_root = %args.cache_root.display(), "status requested");

    for prefix in ["ingest_run_", "report_run_"] {
        match latest_manifest(&manifest_dir, prefix)? {
            Some(path) => {
                let raw = fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let header: ManifestHeader = serde_json::from_slice(&raw)
                    .with_context(|| format!("failed to parse {}", path.display()))?;

                info!(
                    path = %path.display(),
                    run_id = %header.run_id.unwrap_or_default(),
                    status = %header.status.unwrap_or_default(),
                    started_at = %header.started_at.unwrap_or_default(),
                    updated_at = %header.updated_at.unwrap_or_default(),
                    command = %header.command.unwrap_or_default(),
                    "loaded latest manifest"
                );
            }
            None => warn!(dir = %manifest_dir.display(), prefix, "no manifest found"),
        }
    }

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let results = count_rows(&conn, "SELECT COUNT(*) FROM results").unwrap_or(0);
        let experiments =
            count_rows(&conn, "SELECT COUNT(DISTINCT experiment_id) FROM results").unwrap_or(0);
        let summaries = count_rows(&conn, "SELECT COUNT(*) FROM case_summaries").unwrap_or(0);
        let sources = count_rows(&conn, "SELECT COUNT(*) FROM sources").unwrap_or(0);

        info!(
            path = %db_path.display(),
            results,
            experiments,
            summaries,
            sources,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

fn latest_manifest(manifest_dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut latest: Option<PathBuf> = None;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();

        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(prefix) && name.ends_with(".json"))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
