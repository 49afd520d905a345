use anyhow::{bail, Result};
use polars::prelude::DataFrame;
use tracing::{debug, instrument, warn};

use super::{
    cell_to_float, cell_to_label,
    layout::{SectorLayout, YR_QTR_NAME},
};
use crate::{
    grid::{anchor_row, extract_block, locate_col, Grid, Labels},
    table::{float_column, str_column},
};

/// Sector earnings, one column per sector and earnings type.
#[derive(Debug, Clone)]
pub struct SectorData {
    /// `yr_qtr`, then `op_E <sector>` … and `rep_E <sector>` … columns.
    pub by_quarter: DataFrame,
    /// `sector`, `current_price`.
    pub current_price: DataFrame,
}

/// `"2023 Q1"`, `"2023Q1"` or `"2023 1"` → `"2023-Q1"`: the first four
/// characters are the year, the last one the quarter digit.
fn decode_quarter(label: &str) -> Option<String> {
    let label = label.trim();
    let year = label.get(..4)?;
    let quarter = label.chars().last()?;
    if !year.chars().all(|c| c.is_ascii_digit()) || !('1'..='4').contains(&quarter) {
        return None;
    }
    Some(format!("{}-Q{}", year, quarter))
}

/// Read the sector block below `INDEX NAME` and transpose it: every data
/// row becomes an output column aligned with the quarter keys of the header.
#[instrument(level = "debug", skip(grid, layout), fields(sheet = grid.name()))]
pub fn read_sectors<G: Grid + ?Sized>(grid: &G, layout: &SectorLayout) -> Result<SectorData> {
    let start_row = anchor_row(grid, layout.first_col, 1, &Labels::any_of(layout.labels.iter().copied()))?;
    let first_value_col = layout.first_col + 2;
    let last_col = locate_col(grid, start_row, first_value_col, &Labels::Empty)?
        .map(|blank| blank - 1)
        .unwrap_or_else(|| grid.max_column());
    if last_col < first_value_col {
        bail!("no quarter columns in the sector header of `{}`", grid.name());
    }

    let header = extract_block(grid, start_row..=start_row, first_value_col..=last_col, &[]);
    let quarters: Vec<Option<String>> = header
        .into_iter()
        .flatten()
        .map(|cell| cell_to_label(&cell).and_then(|s| decode_quarter(&s)))
        .collect();

    let data = extract_block(
        grid,
        start_row + layout.start_row_data_offset..=start_row + layout.stop_row_data_offset,
        layout.first_col..=last_col,
        &[],
    );
    let data: Vec<_> = data
        .into_iter()
        .filter_map(|row| {
            let name = cell_to_label(&row[0])?;
            (!layout.dividers.contains(&name.as_str())).then_some((name, row))
        })
        .collect();
    if data.len() > 2 * layout.num_inds {
        warn!(
            rows = data.len(),
            expected = 2 * layout.num_inds,
            "extra rows in sector block ignored"
        );
    }

    let mut columns = vec![str_column(YR_QTR_NAME, quarters)];
    let mut sectors = Vec::new();
    let mut prices = Vec::new();
    for (i, (name, row)) in data.iter().take(2 * layout.num_inds).enumerate() {
        // "Information Technology (incl. ...)" → "Information Technology"
        let base = name.split(" (").next().unwrap_or(name).to_string();
        let prefix = if i < layout.num_inds {
            sectors.push(Some(base.clone()));
            prices.push(cell_to_float(&row[1]));
            "op_E"
        } else {
            "rep_E"
        };
        let values = row[2..].iter().map(cell_to_float).collect();
        columns.push(float_column(&format!("{} {}", prefix, base), values));
    }
    let by_quarter = DataFrame::new(columns)?;
    debug!(
        start_row,
        last_col,
        columns = by_quarter.width(),
        "read sector block"
    );

    Ok(SectorData {
        by_quarter,
        current_price: DataFrame::new(vec![
            str_column("sector", sectors),
            float_column("current_price", prices),
        ])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Sheet;
    use crate::parse::layout::SHT_BC_IND;
    use crate::table::{floats, schema_of, strings};

    #[test]
    fn decodes_quarter_labels() {
        assert_eq!(decode_quarter("2023 Q1").as_deref(), Some("2023-Q1"));
        assert_eq!(decode_quarter("20234").as_deref(), Some("2023-Q4"));
        assert_eq!(decode_quarter("INDEX NAME"), None);
    }

    #[test]
    fn transposes_rows_into_columns() {
        let mut s = Sheet::new("SECTOR EPS");
        s.set_a1("A", 5, "INDEX NAME");
        s.set_a1("C", 5, "2023 Q2");
        s.set_a1("D", 5, "2023 Q1");
        s.set_a1("A", 7, "Energy (XLE)");
        s.set_a1("B", 7, 690.0);
        s.set_a1("C", 7, 20.0);
        s.set_a1("D", 7, 25.0);
        s.set_a1("A", 8, "As Reported Earnings Per Share by Economic Sector");
        s.set_a1("A", 9, "Energy (XLE)");
        s.set_a1("B", 9, 690.0);
        s.set_a1("C", 9, 19.0);
        s.set_a1("D", 9, "--");

        let mut layout = SHT_BC_IND;
        layout.num_inds = 1;
        let out = read_sectors(&s, &layout).unwrap();
        let t = &out.by_quarter;
        let names: Vec<String> = schema_of(t).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["yr_qtr", "op_E Energy", "rep_E Energy"]);
        assert_eq!(
            strings(t, "yr_qtr").unwrap(),
            vec![Some("2023-Q2".to_string()), Some("2023-Q1".to_string())]
        );
        assert_eq!(floats(t, "op_E Energy").unwrap(), vec![Some(20.0), Some(25.0)]);
        assert_eq!(floats(t, "rep_E Energy").unwrap(), vec![Some(19.0), None]);
        assert_eq!(floats(&out.current_price, "current_price").unwrap(), vec![Some(690.0)]);
    }
}
