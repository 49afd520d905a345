use super::{CellValue, Grid};
use crate::error::ExtractError;

/// What a marker search is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Labels {
    /// Match only an empty cell.
    Empty,
    /// Match a text cell equal to any of these strings.
    AnyOf(Vec<String>),
}

impl Labels {
    pub fn any_of<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Labels::AnyOf(labels.into_iter().map(Into::into).collect())
    }

    /// The labels as plain strings, for error messages.
    pub fn describe(&self) -> Vec<String> {
        match self {
            Labels::Empty => vec!["<empty>".to_string()],
            Labels::AnyOf(set) => set.clone(),
        }
    }

    fn validate(&self) -> Result<(), ExtractError> {
        match self {
            Labels::Empty => Ok(()),
            Labels::AnyOf(set) if set.is_empty() || set.iter().any(|s| s.trim().is_empty()) => {
                Err(ExtractError::MalformedLabels {
                    labels: set.clone(),
                })
            }
            Labels::AnyOf(_) => Ok(()),
        }
    }

    fn matches(&self, cell: &CellValue) -> bool {
        match (self, cell) {
            (Labels::Empty, CellValue::Empty) => true,
            (Labels::Empty, _) => false,
            (Labels::AnyOf(set), CellValue::Text(s)) => set.iter().any(|l| l == s),
            (Labels::AnyOf(_), _) => false,
        }
    }
}

/// Crawl down `column` from `start_row` (inclusive) to the sheet's last row.
/// Returns the first matching row, or `None` when nothing matches.
pub fn locate_row<G: Grid + ?Sized>(
    grid: &G,
    column: u32,
    start_row: u32,
    labels: &Labels,
) -> Result<Option<u32>, ExtractError> {
    labels.validate()?;
    Ok((start_row.max(1)..=grid.max_row()).find(|&row| labels.matches(grid.value_at(row, column))))
}

/// Crawl along `row` from `start_col` (inclusive) to the sheet's last column.
pub fn locate_col<G: Grid + ?Sized>(
    grid: &G,
    row: u32,
    start_col: u32,
    labels: &Labels,
) -> Result<Option<u32>, ExtractError> {
    labels.validate()?;
    Ok((start_col.max(1)..=grid.max_column()).find(|&col| labels.matches(grid.value_at(row, col))))
}

/// [`locate_row`] for anchors that must exist.
pub fn anchor_row<G: Grid + ?Sized>(
    grid: &G,
    column: u32,
    start_row: u32,
    labels: &Labels,
) -> Result<u32, ExtractError> {
    locate_row(grid, column, start_row, labels)?.ok_or_else(|| ExtractError::LabelNotFound {
        sheet: grid.name().to_string(),
        labels: labels.describe(),
    })
}

/// [`locate_col`] for anchors that must exist.
pub fn anchor_col<G: Grid + ?Sized>(
    grid: &G,
    row: u32,
    start_col: u32,
    labels: &Labels,
) -> Result<u32, ExtractError> {
    locate_col(grid, row, start_col, labels)?.ok_or_else(|| ExtractError::LabelNotFound {
        sheet: grid.name().to_string(),
        labels: labels.describe(),
    })
}
