// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const SP_SOURCE: &str =
    "https://www.spglobal.com/spdji/en/search/?query=index+earnings&activeTab=all";
pub const REAL_RATE_SOURCE: &str = "https://fred.stlouisfed.org/series/DFII10";

/// Directories, file names and switches for one run.
///
/// Every field has a default; a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Snapshot directory, relative to `output_dir`.
    pub estimates_subdir: String,
    pub backup_dir: PathBuf,
    pub record_path: PathBuf,

    /// Glob matched against file names in `input_dir`.
    pub input_glob: String,
    pub rate_file: String,
    pub history_file: String,
    pub backup_history_file: String,
    pub backup_record_file: String,

    pub sp_source: String,
    pub rate_source: String,

    /// Stop after parsing, before anything is written or moved.
    pub halt_before_write: bool,
    /// Join the per-sector earnings onto the history table.
    pub include_sectors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_dir"),
            archive_dir: PathBuf::from("archive_dir"),
            output_dir: PathBuf::from("output_dir"),
            estimates_subdir: "estimates".to_string(),
            backup_dir: PathBuf::from("backup_dir"),
            record_path: PathBuf::from("record_dict.json"),
            input_glob: "sp-500-eps*.xlsx".to_string(),
            rate_file: "DFII10.xlsx".to_string(),
            history_file: "sp500_pe_df_actuals.parquet".to_string(),
            backup_history_file: "backup_pe_df_actuals.parquet".to_string(),
            backup_record_file: "backup_record_dict.json".to_string(),
            sp_source: SP_SOURCE.to_string(),
            rate_source: REAL_RATE_SOURCE.to_string(),
            halt_before_write: false,
            include_sectors: false,
        }
    }
}

impl Config {
    /// Defaults overridden by the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Every directory under `root`, for running against a scratch tree.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            input_dir: root.join(&defaults.input_dir),
            archive_dir: root.join(&defaults.archive_dir),
            output_dir: root.join(&defaults.output_dir),
            backup_dir: root.join(&defaults.backup_dir),
            record_path: root.join(&defaults.record_path),
            ..defaults
        }
    }

    pub fn estimates_dir(&self) -> PathBuf {
        self.output_dir.join(&self.estimates_subdir)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history_file)
    }

    pub fn rate_path(&self) -> PathBuf {
        self.input_dir.join(&self.rate_file)
    }

    pub fn backup_history_path(&self) -> PathBuf {
        self.backup_dir.join(&self.backup_history_file)
    }

    pub fn backup_record_path(&self) -> PathBuf {
        self.backup_dir.join(&self.backup_record_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "input_dir: /data/incoming\nhalt_before_write: true").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.input_dir, PathBuf::from("/data/incoming"));
        assert!(cfg.halt_before_write);
        assert_eq!(cfg.rate_file, "DFII10.xlsx");
        assert_eq!(cfg.rate_path(), PathBuf::from("/data/incoming/DFII10.xlsx"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "inptu_dir: typo").unwrap();
        assert!(Config::load(f.path()).is_err());
    }

    #[test]
    fn rooted_paths() {
        let cfg = Config::rooted_at("/tmp/run");
        assert_eq!(cfg.estimates_dir(), PathBuf::from("/tmp/run/output_dir/estimates"));
        assert_eq!(
            cfg.backup_record_path(),
            PathBuf::from("/tmp/run/backup_dir/backup_record_dict.json")
        );
    }
}
