// src/history/record.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    io::Write,
    path::Path,
};
use tracing::{debug, info};

use crate::quarter::{quarter_of_file, snapshot_file_name};

pub const SP_SOURCE_KEY: &str = "s&p";
pub const RATE_SOURCE_KEY: &str = "tips";

/// Which source files have been seen, which one is authoritative for each
/// quarter, and which snapshot files were derived from them.
///
/// The three file lists are kept reverse-sorted, so the most recent file
/// comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileStateRecord {
    pub sources: BTreeMap<String, String>,
    pub latest_used_file: String,
    pub proj_yr_qtrs: Vec<String>,
    pub prev_used_files: Vec<String>,
    pub output_proj_files: Vec<String>,
    pub prev_files: Vec<String>,
}

impl Default for FileStateRecord {
    fn default() -> Self {
        Self {
            sources: [(SP_SOURCE_KEY, ""), (RATE_SOURCE_KEY, "")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            latest_used_file: String::new(),
            proj_yr_qtrs: Vec::new(),
            prev_used_files: Vec::new(),
            output_proj_files: Vec::new(),
            prev_files: Vec::new(),
        }
    }
}

impl FileStateRecord {
    /// Read the record at `path`, or start empty when there is none.
    ///
    /// An existing record is validated and copied to `backup_path` before
    /// anything else touches it.
    pub fn load_or_init(path: &Path, backup_path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no state record found; starting empty");
            return Ok(Self::default());
        }
        let f = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let record: Self = serde_json::from_reader(f)
            .with_context(|| format!("parsing state record {}", path.display()))?;
        record
            .validate()
            .with_context(|| format!("invalid state record {}", path.display()))?;
        info!(path = %path.display(), used = record.prev_used_files.len(), "read state record");

        record.save(backup_path)?;
        info!(path = %backup_path.display(), "backed up state record");
        Ok(record)
    }

    /// Reject a record whose lists disagree with each other.
    pub fn validate(&self) -> Result<()> {
        let seen: HashSet<&str> = self.prev_files.iter().map(String::as_str).collect();
        if let Some(f) = self.prev_used_files.iter().find(|f| !seen.contains(f.as_str())) {
            bail!("used file `{}` is missing from prev_files", f);
        }

        let mut quarters = HashSet::new();
        for f in &self.prev_used_files {
            if !quarters.insert(quarter_of_file(f)?) {
                bail!("more than one used file for the quarter of `{}`", f);
            }
        }

        let expected: HashSet<String> = self
            .prev_used_files
            .iter()
            .map(|f| snapshot_file_name(f))
            .collect::<Result<_>>()?;
        let actual: HashSet<String> = self.output_proj_files.iter().cloned().collect();
        if expected != actual || actual.len() != self.output_proj_files.len() {
            bail!(
                "output_proj_files {:?} do not match prev_used_files {:?}",
                self.output_proj_files,
                self.prev_used_files
            );
        }

        let keys = Self::quarter_keys(&self.prev_used_files)?;
        if keys != self.proj_yr_qtrs {
            bail!(
                "proj_yr_qtrs {:?} do not match prev_used_files (expected {:?})",
                self.proj_yr_qtrs,
                keys
            );
        }

        let first = self.prev_used_files.first().map(String::as_str).unwrap_or_default();
        if self.latest_used_file != first {
            bail!(
                "latest_used_file `{}` is not the most recent used file `{}`",
                self.latest_used_file,
                first
            );
        }
        Ok(())
    }

    /// Atomically write the record: a `.tmp` sibling, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        serde_json::to_writer_pretty(&mut tmp, self).context("serializing state record")?;
        tmp.write_all(b"\n")?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
        debug!(path = %path.display(), "wrote state record");
        Ok(())
    }

    pub fn set_sources(&mut self, sp: &str, rate: &str) {
        self.sources.insert(SP_SOURCE_KEY.to_string(), sp.to_string());
        self.sources.insert(RATE_SOURCE_KEY.to_string(), rate.to_string());
    }

    /// Restore the list order and recompute the fields derived from
    /// `prev_used_files`.
    pub fn normalize(&mut self) -> Result<()> {
        for list in [
            &mut self.prev_files,
            &mut self.prev_used_files,
            &mut self.output_proj_files,
        ] {
            list.sort_unstable_by(|a, b| b.cmp(a));
            list.dedup();
        }
        self.proj_yr_qtrs = Self::quarter_keys(&self.prev_used_files)?;
        self.latest_used_file = self.prev_used_files.first().cloned().unwrap_or_default();
        Ok(())
    }

    fn quarter_keys(files: &[String]) -> Result<Vec<String>> {
        files
            .iter()
            .map(|f| quarter_of_file(f).map(|q| q.to_string()))
            .collect()
    }
}
