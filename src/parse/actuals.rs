use anyhow::{bail, Result};
use polars::prelude::{DataFrame, DataType};
use tracing::{debug, instrument};

use super::{cell_to_date, cell_to_float, layout::BlockLayout};
use crate::{
    grid::{anchor_row, extract_block, locate_row, Grid, Labels},
    table::{date_column, empty, float_column},
};

/// Read the block of dated rows directly below `layout.labels`.
///
/// The first kept column becomes a date column (time of day dropped), the
/// rest become `Float32` columns, named by `layout.column_names`.
#[instrument(level = "debug", skip(grid, layout), fields(sheet = grid.name(), labels = ?layout.labels))]
pub fn read_history_block<G: Grid + ?Sized>(grid: &G, layout: &BlockLayout) -> Result<DataFrame> {
    let width = (layout.first_col..=layout.last_col)
        .enumerate()
        .filter(|(offset, _)| !layout.skip.contains(offset))
        .count();
    if width != layout.column_names.len() {
        bail!(
            "block layout keeps {} columns but names {} ({:?})",
            width,
            layout.column_names.len(),
            layout.column_names
        );
    }

    let key_row = anchor_row(grid, layout.first_col, 1, &Labels::any_of(layout.labels.iter().copied()))?;
    let start_row = key_row + 1;
    let stop_row = match layout.num_rows {
        Some(n) => start_row + n.saturating_sub(1),
        None => locate_row(grid, layout.first_col, start_row, &Labels::Empty)?
            .map(|blank| blank - 1)
            .unwrap_or_else(|| grid.max_row()),
    };
    if stop_row < start_row || (layout.num_rows == Some(0)) {
        debug!(key_row, "empty block");
        let schema: Vec<(&str, DataType)> = layout
            .column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, if i == 0 { DataType::Date } else { DataType::Float32 }))
            .collect();
        return empty(&schema);
    }

    let rows = extract_block(grid, start_row..=stop_row, layout.first_col..=layout.last_col, layout.skip);
    let dates: Vec<_> = rows.iter().map(|row| cell_to_date(&row[0])).collect();
    let mut columns = vec![date_column(layout.column_names[0], &dates)?];
    for (i, name) in layout.column_names.iter().enumerate().skip(1) {
        columns.push(float_column(name, rows.iter().map(|row| cell_to_float(&row[i])).collect()));
    }
    debug!(start_row, stop_row, "read block");
    Ok(DataFrame::new(columns)?)
}
