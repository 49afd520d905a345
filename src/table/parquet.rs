use anyhow::{Context, Result};
use polars::prelude::*;
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::debug;

/// Write `table` to `path` as a SNAPPY-compressed Parquet file.
/// The file is written to `<path>.tmp` first and renamed into place.
pub fn write_table(table: &DataFrame, path: &Path) -> Result<()> {
    let tmp_path = path.with_extension("parquet.tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("could not create temporary file `{}`", tmp_path.display()))?;
        ParquetWriter::new(&mut file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut table.clone())
            .with_context(|| format!("writing `{}`", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename `{}` to `{}`",
            tmp_path.display(),
            path.display()
        )
    })?;
    debug!(path = %path.display(), rows = table.height(), "wrote table");
    Ok(())
}

/// Read a whole Parquet file into a `DataFrame`.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("decoding table from `{}`", path.display()))
}
