// src/workbook.rs

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, DataType, Range, Reader, Xlsx};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    error::ExtractError,
    grid::{CellValue, Sheet},
};

/// An opened `.xlsx` workbook. Worksheets are loaded on demand into
/// in-memory [`Sheet`]s with cached (computed) values.
pub struct Workbook {
    path: PathBuf,
    inner: Xlsx<BufReader<File>>,
}

impl Workbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner: Xlsx<_> = open_workbook(&path)
            .with_context(|| format!("opening workbook `{}`", path.display()))?;
        Ok(Self { path, inner })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    pub fn sheet(&mut self, name: &str) -> Result<Sheet> {
        if !self.sheet_names().iter().any(|n| n == name) {
            return Err(ExtractError::MissingSheet {
                workbook: self.path.display().to_string(),
                sheet: name.to_string(),
            }
            .into());
        }
        let range = self
            .inner
            .worksheet_range(name)
            .with_context(|| format!("reading sheet `{}` of `{}`", name, self.path.display()))?;
        let sheet = range_to_sheet(name, &range);
        debug!(sheet = name, rows = range.height(), cols = range.width(), "loaded sheet");
        Ok(sheet)
    }

    /// The first (active, for single-sheet downloads) worksheet.
    pub fn first_sheet(&mut self) -> Result<Sheet> {
        let name = self
            .sheet_names()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("workbook `{}` has no sheets", self.path.display()))?;
        self.sheet(&name)
    }
}

fn range_to_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);
    // calamine iterators are relative to `range.start()`
    let Some((row0, col0)) = range.start() else {
        return sheet;
    };
    for (r, c, value) in range.used_cells() {
        let value = convert_value(value);
        if value.is_empty() {
            continue;
        }
        sheet.set(row0 + r as u32 + 1, col0 + c as u32 + 1, value);
    }
    sheet
}

fn convert_value(value: &Data) -> CellValue {
    match value {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        // honours the workbook's 1900 or 1904 date system
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Number(dt.as_f64()), CellValue::Date),
        Data::DateTimeIso(s) => value
            .as_datetime()
            .map_or_else(|| CellValue::Text(s.clone()), CellValue::Date),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
