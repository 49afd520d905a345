use anyhow::Result;
use polars::prelude::DataFrame;
use tracing::{debug, instrument};

use super::{
    cell_to_date, cell_to_float,
    layout::{RateLayout, RR_COL_NAME, YR_QTR_NAME},
};
use crate::{
    grid::Grid,
    table::{date_column, float_column, last_by, with_quarter_key},
};

/// Read the daily real-rate series and keep the last observation per quarter.
///
/// Rows without a date are skipped; a date without a value keeps a null
/// rate. Output columns: `yr_qtr`, `real_int_rate`, sorted by `yr_qtr`.
#[instrument(level = "debug", skip(grid, layout), fields(sheet = grid.name()))]
pub fn read_rates<G: Grid + ?Sized>(grid: &G, layout: &RateLayout) -> Result<DataFrame> {
    let mut dates = Vec::new();
    let mut rates = Vec::new();
    for row in layout.first_row..=grid.max_row() {
        let Some(date) = cell_to_date(grid.value_at(row, layout.date_col)) else {
            continue;
        };
        dates.push(Some(date));
        rates.push(cell_to_float(grid.value_at(row, layout.value_col)));
    }
    debug!(observations = dates.len(), "read rate series");

    let daily = DataFrame::new(vec![
        date_column("date", &dates)?,
        float_column(RR_COL_NAME, rates),
    ])?;
    let daily = with_quarter_key(daily, "date", YR_QTR_NAME)?;
    let quarterly = last_by(&daily, YR_QTR_NAME, "date")?;
    Ok(quarterly.select([YR_QTR_NAME, RR_COL_NAME])?)
}
