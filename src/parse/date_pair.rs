use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use tracing::{debug, instrument};

use super::{cell_to_date, cell_to_float, layout::DatePairLayout};
use crate::{
    error::ExtractError,
    grid::{anchor_row, column_number, Grid, Labels},
    table::{date_column, float_column},
};

/// As-of date of a workbook and, when requested, its two latest prices.
#[derive(Debug, Clone)]
pub struct DatePair {
    pub as_of: Option<NaiveDate>,
    /// `[date, price]`: the as-of price, then the price at the latest
    /// quarter end shown above the actuals block.
    pub prices: Option<DataFrame>,
}

/// Read the as-of date at the top of a sheet, and optionally the price rows.
///
/// A missing label set or a missing anchor is fatal. A cell that holds no
/// date comes back as `None`; the caller decides whether that is fatal.
#[instrument(level = "debug", skip(grid, layout), fields(sheet = grid.name()))]
pub fn read_sp_date<G: Grid + ?Sized>(
    grid: &G,
    layout: &DatePairLayout,
    include_prices: bool,
) -> Result<DatePair> {
    let date_labels = layout
        .date_labels
        .ok_or(ExtractError::MalformedLabels { labels: Vec::new() })?;
    let key_row = anchor_row(grid, column_number("A"), 1, &Labels::any_of(date_labels.iter().copied()))?;

    let as_of = cell_to_date(grid.value_at(key_row, layout.value_col));
    debug!(key_row, as_of = ?as_of, "found as-of date");
    if !include_prices {
        return Ok(DatePair { as_of, prices: None });
    }

    let mut dates = vec![as_of];
    let mut prices = vec![cell_to_float(grid.value_at(key_row + 1, layout.value_col))];

    let price_labels = layout
        .price_labels
        .ok_or(ExtractError::MalformedLabels { labels: Vec::new() })?;
    let second = anchor_row(grid, column_number("A"), key_row, &Labels::any_of(price_labels.iter().copied()))?;
    // the latest quarter-end price sits two rows above the actuals label
    let row = second.saturating_sub(2);
    dates.push(cell_to_date(grid.value_at(row, column_number("A"))));
    prices.push(cell_to_float(grid.value_at(row, layout.price_col)));

    let [date_name, price_name] = layout.column_names;
    let table = DataFrame::new(vec![
        date_column(date_name, &dates)?,
        float_column(price_name, prices),
    ])?;
    Ok(DatePair {
        as_of,
        prices: Some(table),
    })
}
