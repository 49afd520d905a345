use anyhow::{bail, Result};
use polars::prelude::DataFrame;
use tracing::{debug, instrument};

use super::{
    cell_to_float, cell_to_label,
    layout::{MarginLayout, MARGIN_COL_NAME, YR_QTR_NAME},
};
use crate::{
    grid::{anchor_row, extract_block, locate_col, Grid, Labels},
    table::{float_column, str_column},
};

/// Read the operating-margin block and reshape it from one column per year
/// to one row per `YYYY-Qn`.
///
/// Output columns: `op_margin`, `yr_qtr`, sorted by `yr_qtr`.
#[instrument(level = "debug", skip(grid, layout), fields(sheet = grid.name()))]
pub fn read_margins<G: Grid + ?Sized>(grid: &G, layout: &MarginLayout) -> Result<DataFrame> {
    let start_row = anchor_row(grid, layout.first_col, 1, &Labels::any_of(layout.labels.iter().copied()))?;
    let stop_row = start_row + layout.data_rows;
    // the year columns end at the first blank header cell
    let last_col = locate_col(grid, start_row, layout.first_col + 1, &Labels::Empty)?
        .map(|blank| blank - 1)
        .unwrap_or_else(|| grid.max_column());
    if last_col <= layout.first_col {
        bail!("no year columns next to the margin label in `{}`", grid.name());
    }

    let block = extract_block(grid, start_row..=stop_row, layout.first_col..=last_col, &[]);
    let Some((header, data)) = block.split_first() else {
        bail!("empty margin block in `{}`", grid.name());
    };

    // "2008*" → "2008"; footnote markers follow the year
    let years: Vec<Option<String>> = header[1..]
        .iter()
        .map(|cell| {
            cell_to_label(cell).and_then(|s| {
                let year = s.split('*').next().unwrap_or_default().trim().to_string();
                (!year.is_empty()).then_some(year)
            })
        })
        .collect();

    let mut rows: Vec<(String, Option<f32>)> = Vec::new();
    for row in data {
        // "Q1 (Mar)" → "Q1"
        let Some(qtr) = cell_to_label(&row[0])
            .and_then(|s| s.split_whitespace().next().map(str::to_string))
        else {
            continue;
        };
        for (year, cell) in years.iter().zip(&row[1..]) {
            if let Some(year) = year {
                rows.push((format!("{}-{}", year, qtr), cell_to_float(cell)));
            }
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    debug!(start_row, last_col, values = rows.len(), "reshaped margins");

    let (keys, values): (Vec<_>, Vec<_>) = rows.into_iter().map(|(k, v)| (Some(k), v)).unzip();
    Ok(DataFrame::new(vec![
        float_column(MARGIN_COL_NAME, values),
        str_column(YR_QTR_NAME, keys),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Sheet;
    use crate::parse::layout::SHT_BC_MARG;
    use crate::table::{floats, strings};

    #[test]
    fn wide_to_tall_with_footnotes() {
        let mut s = Sheet::new("ESTIMATES&PEs");
        s.set_a1("A", 20, "QTR");
        s.set_a1("B", 20, 2023.0);
        s.set_a1("C", 20, "2008*");
        for (i, q) in ["Q1", "Q2 (Jun)", "Q3", "Q4"].iter().enumerate() {
            let row = 21 + i as u32;
            s.set_a1("A", row, *q);
            s.set_a1("B", row, 11.0 + i as f64);
            s.set_a1("C", row, 7.0 + i as f64);
        }
        // beyond the blank header cell: ignored
        s.set_a1("E", 20, "notes");
        s.set_a1("E", 21, 99.0);

        let t = read_margins(&s, &SHT_BC_MARG).unwrap();
        assert_eq!(t.height(), 8);
        let keys = strings(&t, "yr_qtr").unwrap();
        assert_eq!(keys[0].as_deref(), Some("2008-Q1"));
        assert_eq!(keys[7].as_deref(), Some("2023-Q4"));
        let margins = floats(&t, "op_margin").unwrap();
        assert_eq!(margins[1], Some(8.0)); // 2008-Q2
        assert_eq!(margins[5], Some(12.0)); // 2023-Q2
    }

    #[test]
    fn margin_label_must_exist() {
        let s = Sheet::new("ESTIMATES&PEs");
        assert!(read_margins(&s, &SHT_BC_MARG).is_err());
    }
}
