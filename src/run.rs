// src/run.rs

use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use polars::prelude::DataFrame;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{
    config::Config,
    history::{apply_plan, new_files, plan_update, remove_snapshots, FileStateRecord},
    merge::{fold_history, projection_schema, read_history, read_projection_file, Projection},
    parse::layout::YR_QTR_NAME,
    quarter::snapshot_file_name,
    table::{
        parquet::{read_table, write_table},
        schema_of,
    },
};

/// Entries of each record list shown in the run summary.
const SUMMARY_HEAD: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Input files not seen by any earlier run.
    pub new_files: Vec<String>,
    /// New files whose projections were read and taken into use.
    pub files_read: Vec<String>,
    /// New files skipped because their projections had no usable dates.
    pub failures: Vec<String>,
    pub history_updated: bool,
    pub record: FileStateRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every input file was seen before; nothing was read or written.
    NothingNew,
    /// Everything was parsed but nothing written (debug halt).
    Halted(RunSummary),
    Completed(RunSummary),
}

/// File names in the input directory matching the configured glob.
fn list_input_files(config: &Config) -> Result<Vec<String>> {
    if !config.input_dir.is_dir() {
        warn!(dir = %config.input_dir.display(), "input directory does not exist");
        return Ok(Vec::new());
    }
    // the directory part is literal; only the file name is a pattern
    let dir = Pattern::escape(&config.input_dir.to_string_lossy());
    let pattern = format!("{}/{}", dir, config.input_glob);
    let mut names = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("bad input glob `{}`", pattern))? {
        let path = entry?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Move `from` into `dir`. A missing source is logged and skipped.
fn archive(from: &Path, dir: &Path) -> Result<()> {
    if !from.exists() {
        warn!(path = %from.display(), "cannot archive: file does not exist");
        return Ok(());
    }
    let Some(name) = from.file_name() else {
        bail!("no file name in {}", from.display());
    };
    let to: PathBuf = dir.join(name);
    fs::rename(from, &to)
        .with_context(|| format!("moving {} -> {}", from.display(), to.display()))?;
    info!(file = %to.display(), "archived");
    Ok(())
}

fn write_snapshot(dir: &Path, projection: &Projection) -> Result<()> {
    let schema = schema_of(&projection.table);
    if schema != projection_schema() {
        bail!("projection of `{}` has schema {:?}", projection.source, schema);
    }
    let path = dir.join(snapshot_file_name(&projection.source)?);
    write_table(&projection.table, &path)?;
    info!(
        source = %projection.source,
        as_of = %projection.as_of,
        rows = projection.table.height(),
        path = %path.display(),
        "wrote snapshot"
    );
    Ok(())
}

/// Replace the history file, keeping the previous one as a backup.
fn write_history(config: &Config, history: &DataFrame) -> Result<()> {
    let path = config.history_path();
    if path.exists() {
        let backup = config.backup_history_path();
        fs::copy(&path, &backup)
            .with_context(|| format!("backing up {} -> {}", path.display(), backup.display()))?;
        info!(path = %backup.display(), "backed up history");
    } else {
        info!(path = %path.display(), "no history file to back up");
    }
    write_table(history, &path)?;
    info!(
        path = %path.display(),
        rows = history.height(),
        columns = history.width(),
        "wrote history"
    );
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    let head = |list: &[String]| list.iter().take(SUMMARY_HEAD).cloned().collect::<Vec<_>>();
    let r = &summary.record;
    info!(
        read = summary.files_read.len(),
        failed = summary.failures.len(),
        failures = ?summary.failures,
        history_updated = summary.history_updated,
        latest_used_file = %r.latest_used_file,
        "run complete"
    );
    info!(
        output_proj_files = ?head(&r.output_proj_files),
        prev_used_files = ?head(&r.prev_used_files),
        prev_files = ?head(&r.prev_files),
        proj_yr_qtrs = ?head(&r.proj_yr_qtrs),
        "state record"
    );
}

/// One ingestion run: reconcile new input files against the state record,
/// parse projections and (when the newest source changed) the history,
/// then write snapshots, history and record, and archive the inputs.
///
/// With `halt` (or `halt_before_write` in the config) the run stops after
/// parsing and nothing on disk changes apart from the record backup.
pub fn run(config: &Config, halt: bool) -> Result<RunOutcome> {
    let halt = halt || config.halt_before_write;

    if let Some(dir) = config.backup_record_path().parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut record = FileStateRecord::load_or_init(&config.record_path, &config.backup_record_path())?;
    record.set_sources(&config.sp_source, &config.rate_source);

    let new: Vec<String> = new_files(&record, list_input_files(config)?).into_iter().collect();
    if new.is_empty() {
        info!(dir = %config.input_dir.display(), "no new input files; all were read before");
        return Ok(RunOutcome::NothingNew);
    }
    info!(count = new.len(), files = ?new, "new input files");
    record.prev_files.extend(new.iter().cloned());

    let plan = plan_update(&record.prev_used_files, &new)?;
    for file in &plan.unchanged {
        info!(file = %file.name, quarter = %file.quarter, "no newer data for its quarter");
    }

    let mut projections = Vec::new();
    let mut failures = Vec::new();
    for file in plan.files_to_read() {
        let path = config.input_dir.join(&file.name);
        match read_projection_file(&path)? {
            Some(p) => {
                if p.as_of != file.date {
                    warn!(file = %file.name, as_of = %p.as_of, "as-of date differs from the file name");
                }
                projections.push(p);
            }
            None => failures.push(file.name.clone()),
        }
    }

    let failed: HashSet<String> = failures.iter().cloned().collect();
    let applied = apply_plan(&mut record, &plan, &failed)?;

    let history_updated = applied.used.contains(&record.latest_used_file);
    let history = if history_updated {
        let source = config.input_dir.join(&record.latest_used_file);
        info!(file = %record.latest_used_file, "updating history");
        let fresh = read_history(&source, &config.rate_path(), config.include_sectors)?;
        let path = config.history_path();
        Some(if path.exists() {
            fold_history(&read_table(&path)?, &fresh, YR_QTR_NAME)?
        } else {
            fresh
        })
    } else {
        info!(latest = %record.latest_used_file, "history already built from the latest file");
        None
    };

    let summary = RunSummary {
        new_files: new.clone(),
        files_read: applied.used.clone(),
        failures,
        history_updated,
        record: record.clone(),
    };
    if halt {
        info!("halt requested: no data files have been written");
        return Ok(RunOutcome::Halted(summary));
    }

    let estimates_dir = config.estimates_dir();
    for dir in [&estimates_dir, &config.archive_dir] {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    for p in projections.iter().filter(|p| applied.used.contains(&p.source)) {
        write_snapshot(&estimates_dir, p)?;
    }
    remove_snapshots(&estimates_dir, &applied.retired_snapshots)?;
    if let Some(history) = &history {
        write_history(config, history)?;
    }

    record.validate().context("state record after update")?;
    record.save(&config.record_path)?;
    info!(path = %config.record_path.display(), "saved state record");

    for name in &new {
        archive(&config.input_dir.join(name), &config.archive_dir)?;
    }
    archive(&config.rate_path(), &config.archive_dir)?;

    log_summary(&summary);
    Ok(RunOutcome::Completed(summary))
}
