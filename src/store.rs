use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

use crate::model::{ExperimentId, GroupKey, ResultRow, Role};
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn open_store(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sources (
          source_id INTEGER PRIMARY KEY AUTOINCREMENT,
          path TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          ingested_at TEXT NOT NULL,
          row_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS results (
          row_id INTEGER PRIMARY KEY,
          role TEXT NOT NULL,
          experiment_id TEXT NOT NULL,
          objective_metric TEXT NOT NULL,
          optim_algo TEXT NOT NULL,
          we_model TEXT NOT NULL,
          ground_truth_name TEXT NOT NULL,
          metric_value REAL NOT NULL,
          status TEXT,
          source_line INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_results_group
          ON results(optim_algo, objective_metric, we_model, ground_truth_name);

        CREATE TABLE IF NOT EXISTS case_summaries (
          run_id TEXT NOT NULL,
          seq INTEGER NOT NULL,
          outcome TEXT NOT NULL,
          timestamp TEXT NOT NULL,
          cohort_size TEXT NOT NULL,
          optim_algo TEXT NOT NULL,
          worst_baseline TEXT NOT NULL,
          worst_optimized TEXT NOT NULL,
          worst_improvement TEXT NOT NULL,
          average_baseline TEXT NOT NULL,
          average_optimized TEXT NOT NULL,
          average_improvement_from_averages TEXT NOT NULL,
          average_improvement_from_individual TEXT NOT NULL,
          best_baseline TEXT NOT NULL,
          best_optimized TEXT NOT NULL,
          best_improvement TEXT NOT NULL,
          ground_truth_name TEXT NOT NULL,
          model_label TEXT NOT NULL,
          objective_metric TEXT NOT NULL,
          worst_experiment_id TEXT NOT NULL,
          best_experiment_id TEXT NOT NULL,
          PRIMARY KEY(run_id, seq)
        );
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![DB_SCHEMA_VERSION],
    )?;

    Ok(())
}

pub fn replace_results(
    connection: &mut Connection,
    rows: &[ResultRow],
    source_lines: &[usize],
    source_path: &str,
    source_sha256: &str,
) -> Result<usize> {
    let tx = connection.transaction()?;
    tx.execute("DELETE FROM results", [])?;

    let mut inserted = 0usize;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO results(
              row_id, role, experiment_id, objective_metric, optim_algo, we_model,
              ground_truth_name, metric_value, status, source_line
            ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )?;

        for (index, row) in rows.iter().enumerate() {
            let source_line = source_lines.get(index).map(|line| *line as i64);
            statement.execute(params![
                (index + 1) as i64,
                row.role.as_str(),
                row.experiment_id.as_str(),
                row.group_key.objective_metric,
                row.group_key.optim_algo,
                row.group_key.we_model,
                row.group_key.ground_truth_name,
                row.metric_value,
                row.status,
                source_line,
            ])?;
            inserted += 1;
        }
    }

    tx.execute(
        "INSERT INTO sources(path, sha256, ingested_at, row_count) VALUES(?1, ?2, ?3, ?4)",
        params![source_path, source_sha256, now_utc_string(), inserted as i64],
    )?;
    tx.commit()?;

    Ok(inserted)
}

pub fn load_results(connection: &Connection) -> Result<Vec<ResultRow>> {
    let mut statement = connection.prepare(
        "
        SELECT role, experiment_id, objective_metric, optim_algo, we_model,
               ground_truth_name, metric_value, status
        FROM results
        ORDER BY row_id ASC
        ",
    )?;

    let raw_rows = statement.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            GroupKey {
                objective_metric: row.get(2)?,
                optim_algo: row.get(3)?,
                we_model: row.get(4)?,
                ground_truth_name: row.get(5)?,
            },
            row.get::<_, f64>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut rows = Vec::new();
    for raw in raw_rows {
        let (role, experiment_id, group_key, metric_value, status) = raw?;
        let Some(role) = Role::parse(&role) else {
            bail!("unknown role {role:?} in results table for experiment {experiment_id}");
        };
        rows.push(ResultRow {
            role,
            experiment_id: ExperimentId::new(experiment_id),
            group_key,
            metric_value,
            status,
        });
    }

    Ok(rows)
}

pub fn insert_summary_rows(
    connection: &mut Connection,
    run_id: &str,
    rows: &[(String, Vec<String>)],
) -> Result<usize> {
    let tx = connection.transaction()?;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO case_summaries(
              run_id, seq, outcome, timestamp, cohort_size, optim_algo,
              worst_baseline, worst_optimized, worst_improvement,
              average_baseline, average_optimized,
              average_improvement_from_averages, average_improvement_from_individual,
              best_baseline, best_optimized, best_improvement,
              ground_truth_name, model_label, objective_metric,
              worst_experiment_id, best_experiment_id
            ) VALUES(
              ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
              ?17, ?18, ?19, ?20, ?21
            )
            ",
        )?;

        for (seq, (outcome, cells)) in rows.iter().enumerate() {
            let [
                timestamp,
                cohort_size,
                optim_algo,
                worst_baseline,
                worst_optimized,
                worst_improvement,
                average_baseline,
                average_optimized,
                average_from_averages,
                average_from_individual,
                best_baseline,
                best_optimized,
                best_improvement,
                ground_truth_name,
                model_label,
                objective_metric,
                worst_experiment_id,
                best_experiment_id,
            ] = cells.as_slice()
            else {
                bail!(
                    "summary row {seq} has {} cells, expected 18",
                    cells.len()
                );
            };

            statement.execute(params![
                run_id,
                seq as i64,
                outcome,
                timestamp,
                cohort_size,
                optim_algo,
                worst_baseline,
                worst_optimized,
                worst_improvement,
                average_baseline,
                average_optimized,
                average_from_averages,
                average_from_individual,
                best_baseline,
                best_optimized,
                best_improvement,
                ground_truth_name,
                model_label,
                objective_metric,
                worst_experiment_id,
                best_experiment_id,
            ])?;
        }
    }
    tx.commit()?;

    Ok(rows.len())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
