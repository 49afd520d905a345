// src/history/reconcile.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fs,
    io::ErrorKind,
    path::Path,
};
use tracing::{info, warn};

use super::record::FileStateRecord;
use crate::quarter::{date_from_file_name, snapshot_file_name, YearQuarter};

/// A source file name with the date and quarter it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub date: NaiveDate,
    pub quarter: YearQuarter,
}

impl SourceFile {
    pub fn parse(name: &str) -> Result<Self> {
        let date = date_from_file_name(name)?;
        Ok(Self {
            name: name.to_string(),
            date,
            quarter: YearQuarter::from_date(date),
        })
    }

    pub fn snapshot_name(&self) -> Result<String> {
        snapshot_file_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub retired: SourceFile,
    pub current: SourceFile,
}

/// Outcome of comparing this run's new files with the files on record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// New files for quarters with no used file yet.
    pub additions: Vec<SourceFile>,
    /// New files strictly later than the used file of their quarter.
    pub replacements: Vec<Replacement>,
    /// New files that are not later than the used file of their quarter,
    /// or that lost to a later new file of the same quarter.
    pub unchanged: Vec<SourceFile>,
}

impl UpdatePlan {
    /// Files whose projections must be read this run, ordered by quarter.
    pub fn files_to_read(&self) -> Vec<&SourceFile> {
        let mut files: Vec<&SourceFile> = self
            .additions
            .iter()
            .chain(self.replacements.iter().map(|r| &r.current))
            .collect();
        files.sort_by_key(|f| f.quarter);
        files
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.replacements.is_empty()
    }
}

/// Names in `present` that the record has never seen.
pub fn new_files<I, S>(record: &FileStateRecord, present: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let seen: HashSet<&str> = record.prev_files.iter().map(String::as_str).collect();
    present
        .into_iter()
        .map(Into::into)
        .filter(|name| !seen.contains(name.as_str()))
        .collect()
}

/// One file per quarter: the latest date wins, then the greater name.
/// Everything else is returned as the second element.
fn latest_per_quarter(files: Vec<SourceFile>) -> (BTreeMap<YearQuarter, SourceFile>, Vec<SourceFile>) {
    let mut latest: BTreeMap<YearQuarter, SourceFile> = BTreeMap::new();
    let mut losers = Vec::new();
    for file in files {
        match latest.get(&file.quarter) {
            Some(held) if (held.date, &held.name) >= (file.date, &file.name) => losers.push(file),
            _ => {
                if let Some(old) = latest.insert(file.quarter, file) {
                    losers.push(old);
                }
            }
        }
    }
    (latest, losers)
}

/// Decide, per quarter, what this run's new files do to the used files.
///
/// Pure: nothing is read from or written to disk.
pub fn plan_update<U, N>(used: &[U], new: &[N]) -> Result<UpdatePlan>
where
    U: AsRef<str>,
    N: AsRef<str>,
{
    let used = used
        .iter()
        .map(|f| SourceFile::parse(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let new = new
        .iter()
        .map(|f| SourceFile::parse(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let (used, _) = latest_per_quarter(used);
    let (new, unchanged) = latest_per_quarter(new);

    let mut plan = UpdatePlan {
        unchanged,
        ..UpdatePlan::default()
    };
    for (quarter, file) in new {
        match used.get(&quarter) {
            None => plan.additions.push(file),
            Some(held) if file.date > held.date => plan.replacements.push(Replacement {
                retired: held.clone(),
                current: file,
            }),
            Some(_) => plan.unchanged.push(file),
        }
    }
    plan.unchanged.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(plan)
}

/// What applying a plan changed in the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Files taken into `prev_used_files`.
    pub used: Vec<String>,
    /// Snapshots of the files they retired, to be deleted.
    pub retired_snapshots: Vec<String>,
}

/// Write `plan` into `record`, leaving out the files in `failed`.
///
/// A replacement whose new file failed keeps the old file and its
/// snapshot. Nothing on disk is touched; see [`remove_snapshots`].
pub fn apply_plan(
    record: &mut FileStateRecord,
    plan: &UpdatePlan,
    failed: &HashSet<String>,
) -> Result<Applied> {
    let mut applied = Applied::default();
    let mut taken = Vec::new();

    for r in &plan.replacements {
        if failed.contains(&r.current.name) {
            warn!(file = %r.current.name, kept = %r.retired.name, "replacement unreadable; keeping used file");
            continue;
        }
        let snapshot = r.retired.snapshot_name()?;
        record.prev_used_files.retain(|f| f != &r.retired.name);
        record.output_proj_files.retain(|f| f != &snapshot);
        info!(retired = %r.retired.name, by = %r.current.name, quarter = %r.current.quarter, "replacing used file");
        applied.retired_snapshots.push(snapshot);
        taken.push(&r.current);
    }
    taken.extend(plan.additions.iter().filter(|f| !failed.contains(&f.name)));

    for file in taken {
        record.prev_used_files.push(file.name.clone());
        record.output_proj_files.push(file.snapshot_name()?);
        applied.used.push(file.name.clone());
    }
    record.normalize()?;
    Ok(applied)
}

/// Delete retired snapshots from `dir`. An absent file is logged and skipped.
pub fn remove_snapshots(dir: &Path, names: &[String]) -> Result<()> {
    for name in names {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => info!(file = %name, "removed superseded snapshot"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "superseded snapshot does not exist")
            }
            Err(e) => {
                return Err(e).with_context(|| format!("removing {}", path.display()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn record_with(used: &[&str]) -> FileStateRecord {
        let mut r = FileStateRecord::default();
        r.prev_files = used.iter().map(|f| s(f)).collect();
        r.prev_used_files = r.prev_files.clone();
        r.output_proj_files = used.iter().map(|f| snapshot_file_name(f).unwrap()).collect();
        r.normalize().unwrap();
        r
    }

    /// What one run does to the record for the given directory listing.
    fn reconcile(record: &mut FileStateRecord, present: &[&str], dir: &Path) -> Vec<String> {
        let new: Vec<String> = new_files(record, present.iter().copied()).into_iter().collect();
        if new.is_empty() {
            return Vec::new();
        }
        record.prev_files.extend(new.iter().cloned());
        let plan = plan_update(&record.prev_used_files, &new).unwrap();
        let applied = apply_plan(record, &plan, &HashSet::new()).unwrap();
        remove_snapshots(dir, &applied.retired_snapshots).unwrap();
        applied.used
    }

    #[test]
    fn addition_and_one_file_per_quarter() {
        let plan = plan_update::<String, _>(
            &[],
            &["rpt 2023 01 05.xlsx", "rpt 2023 03 20.xlsx", "rpt 2023 06 19.xlsx"],
        )
        .unwrap();
        let names: Vec<&str> = plan.files_to_read().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["rpt 2023 03 20.xlsx", "rpt 2023 06 19.xlsx"]);
        assert_eq!(plan.unchanged.len(), 1);
        assert_eq!(plan.unchanged[0].name, "rpt 2023 01 05.xlsx");
    }

    #[test]
    fn later_file_replaces_used_file_and_its_snapshot() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("rpt 2023-01-05.parquet"), b"old").unwrap();
        let mut record = record_with(&["rpt 2023 01 05.xlsx"]);

        let read = reconcile(&mut record, &["rpt 2023 03 20.xlsx"], dir.path());
        assert_eq!(read, vec![s("rpt 2023 03 20.xlsx")]);
        assert_eq!(record.prev_used_files, vec![s("rpt 2023 03 20.xlsx")]);
        assert_eq!(record.output_proj_files, vec![s("rpt 2023-03-20.parquet")]);
        assert_eq!(record.proj_yr_qtrs, vec![s("2023-Q1")]);
        assert!(!dir.path().join("rpt 2023-01-05.parquet").exists());
        record.validate().unwrap();
    }

    #[test]
    fn earlier_or_equal_file_never_replaces() {
        let dir = tempdir().unwrap();
        let mut record = record_with(&["rpt 2023 03 20.xlsx"]);
        let read = reconcile(&mut record, &["rpt 2023 01 05.xlsx"], dir.path());
        assert!(read.is_empty());
        assert_eq!(record.prev_used_files, vec![s("rpt 2023 03 20.xlsx")]);
        assert_eq!(record.prev_files.len(), 2);

        // same date, different prefix
        let plan = plan_update(&["rpt 2023 03 20.xlsx"], &["rpt-v2 2023 03 20.xlsx"]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged.len(), 1);
    }

    #[test]
    fn second_run_on_same_files_changes_nothing() {
        let dir = tempdir().unwrap();
        let present = ["rpt 2023 03 20.xlsx", "rpt 2023 06 19.xlsx"];
        let mut record = FileStateRecord::default();
        reconcile(&mut record, &present, dir.path());
        let after_first = record.clone();

        let read = reconcile(&mut record, &present, dir.path());
        assert!(read.is_empty());
        assert_eq!(record, after_first);
        assert_eq!(record.proj_yr_qtrs, vec![s("2023-Q2"), s("2023-Q1")]);
    }

    #[test]
    fn missing_snapshot_is_only_a_warning() {
        let dir = tempdir().unwrap();
        let mut record = record_with(&["rpt 2023 01 05.xlsx"]);
        let read = reconcile(&mut record, &["rpt 2023 02 01.xlsx"], dir.path());
        assert_eq!(read, vec![s("rpt 2023 02 01.xlsx")]);
    }

    #[test]
    fn failed_file_keeps_previous_used_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("rpt 2023-01-05.parquet"), b"old").unwrap();
        let mut record = record_with(&["rpt 2023 01 05.xlsx"]);
        let plan = plan_update(&record.prev_used_files, &["rpt 2023 03 20.xlsx"]).unwrap();
        let failed: HashSet<String> = [s("rpt 2023 03 20.xlsx")].into_iter().collect();

        let applied = apply_plan(&mut record, &plan, &failed).unwrap();
        assert_eq!(applied, Applied::default());
        assert_eq!(record.prev_used_files, vec![s("rpt 2023 01 05.xlsx")]);
        assert!(dir.path().join("rpt 2023-01-05.parquet").exists());
    }

    #[test]
    fn malformed_name_is_an_error() {
        assert!(plan_update::<String, _>(&[], &["sp-500-eps-est.xlsx"]).is_err());
    }
}
