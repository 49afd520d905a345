// src/merge.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::{DataFrame, DataType};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ExtractError,
    grid::Grid,
    parse::{
        layout::{
            EST_DATE, PROJ_COLUMN_NAMES, PROJ_DATE, SHT_BC_IND, SHT_BC_MARG, SHT_EST_NAME,
            SHT_EST_PROJ, SHT_FRED, SHT_HIST, SHT_IND_NAME, SHT_QTR, SHT_QTR_NAME, YR_QTR_NAME,
        },
        read_history_block, read_margins, read_rates, read_sectors, read_sp_date,
    },
    table::{concat_diagonal, group_last, last_by, left_join, require_unique, with_quarter_key},
    workbook::Workbook,
};

/// The sheets the history table is built from.
pub struct HistorySheets<'a, G: Grid + ?Sized> {
    pub estimates: &'a G,
    pub quarterly: &'a G,
    pub sectors: Option<&'a G>,
    pub rates: &'a G,
}

/// A parsed projection block and the as-of date it was published with.
#[derive(Debug, Clone)]
pub struct Projection {
    pub source: String,
    pub as_of: NaiveDate,
    pub table: DataFrame,
}

fn require_dates(table: &DataFrame, column: &str, context: &str) -> Result<()> {
    if table.column(column)?.null_count() > 0 {
        return Err(ExtractError::NullDate {
            context: context.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Build the wide history table: price and actuals rows keyed by quarter,
/// with rates, margins, quarterly data and (optionally) sectors joined on.
#[instrument(level = "debug", skip(sheets), fields(sheet = sheets.estimates.name()))]
pub fn build_history<G: Grid + ?Sized>(sheets: &HistorySheets<'_, G>) -> Result<DataFrame> {
    let pair = read_sp_date(sheets.estimates, &EST_DATE, true)?;
    let actuals = read_history_block(sheets.estimates, &SHT_HIST)?;

    let context = sheets.estimates.name();
    let Some(as_of) = pair.as_of else {
        return Err(ExtractError::NullDate {
            context: format!("as-of date of `{}`", context),
        }
        .into());
    };
    let Some(prices) = pair.prices else {
        bail!("no price rows read from `{}`", context);
    };
    require_dates(&prices, "date", &format!("price rows of `{}`", context))?;
    require_dates(&actuals, "date", &format!("actuals block of `{}`", context))?;
    debug!(%as_of, actuals = actuals.height(), "read actuals");

    let mut history = with_quarter_key(concat_diagonal(&prices, &actuals)?, "date", YR_QTR_NAME)?;

    let rates = read_rates(sheets.rates, &SHT_FRED)?;
    history = left_join(&history, &rates, YR_QTR_NAME).context("joining real rates")?;

    let margins = read_margins(sheets.estimates, &SHT_BC_MARG)?;
    history = left_join(&history, &margins, YR_QTR_NAME).context("joining margins")?;

    if let Some(sectors) = sheets.sectors {
        let sectors = read_sectors(sectors, &SHT_BC_IND)?;
        history = left_join(&history, &sectors.by_quarter, YR_QTR_NAME).context("joining sectors")?;
    }

    let quarterly = with_quarter_key(read_history_block(sheets.quarterly, &SHT_QTR)?, "date", YR_QTR_NAME)?;
    let quarterly = last_by(&quarterly, YR_QTR_NAME, "date")?;
    history = left_join(&history, &quarterly, YR_QTR_NAME).context("joining quarterly data")?;

    collapse_quarters(&history, YR_QTR_NAME, "date")
}

/// Open the source workbook and the rate workbook and build the history.
pub fn read_history(source: &Path, rate_file: &Path, include_sectors: bool) -> Result<DataFrame> {
    let mut book = Workbook::open(source)?;
    let estimates = book.sheet(SHT_EST_NAME)?;
    let quarterly = book.sheet(SHT_QTR_NAME)?;
    let sectors = if include_sectors {
        Some(book.sheet(SHT_IND_NAME)?)
    } else {
        None
    };
    let rates = Workbook::open(rate_file)?.first_sheet()?;

    let table = build_history(&HistorySheets {
        estimates: &estimates,
        quarterly: &quarterly,
        sectors: sectors.as_ref(),
        rates: &rates,
    })?;
    info!(
        source = %source.display(),
        rows = table.height(),
        columns = table.width(),
        "built history"
    );
    Ok(table)
}

/// One row per `key`. Within a group the row with the latest `order_by`
/// date wins (the later row on a tie) and its nulls are filled from the
/// other rows, most recent first. Rows without a key are dropped; the
/// result is sorted by `key`.
pub fn collapse_quarters(table: &DataFrame, key: &str, order_by: &str) -> Result<DataFrame> {
    group_last(table, key, Some(order_by), true)
}

/// Rows of `table` with a key, each key once.
fn keyed_rows(table: &DataFrame, key: &str) -> Result<DataFrame> {
    let missing = table.column(key)?.null_count();
    let table = if missing > 0 {
        warn!(rows = missing, "dropping history rows without `{}`", key);
        table.filter(&table.column(key)?.is_not_null())?
    } else {
        table.clone()
    };
    require_unique(&table, key).context("history")?;
    Ok(table)
}

/// Fold freshly built rows onto the persisted table.
///
/// Fresh non-null cells win; a fresh null keeps the persisted value.
/// Quarters and columns only the persisted table has are kept, new ones
/// are added. The result is sorted by `key`. A column whose type differs
/// between the two is an error.
pub fn fold_history(persisted: &DataFrame, fresh: &DataFrame, key: &str) -> Result<DataFrame> {
    for column in fresh.get_columns() {
        if let Ok(held) = persisted.column(column.name().as_str()) {
            if held.dtype() != column.dtype() {
                bail!(
                    "column `{}` is {} in the persisted history but {} in the new one",
                    column.name(),
                    held.dtype(),
                    column.dtype()
                );
            }
        }
    }
    let stacked = concat_diagonal(&keyed_rows(persisted, key)?, &keyed_rows(fresh, key)?)?;
    // fresh rows sit below the persisted ones, so their values come last
    group_last(&stacked, key, None, true)
}

/// Parse one workbook's projection block.
///
/// `Ok(None)` when the as-of date or any projection date is missing; the
/// caller skips that file.
#[instrument(level = "debug", skip(grid), fields(sheet = grid.name()))]
pub fn read_projection<G: Grid + ?Sized>(grid: &G, source: &str) -> Result<Option<Projection>> {
    let pair = read_sp_date(grid, &PROJ_DATE, false)?;
    let table = read_history_block(grid, &SHT_EST_PROJ)?;

    let Some(as_of) = pair.as_of else {
        warn!(file = %source, "projection has no as-of date; skipped");
        return Ok(None);
    };
    if table.column("date")?.null_count() > 0 {
        warn!(file = %source, %as_of, "projection has a row without a date; skipped");
        return Ok(None);
    }
    let table = with_quarter_key(table, "date", YR_QTR_NAME)?;
    Ok(Some(Projection {
        source: source.to_string(),
        as_of,
        table,
    }))
}

/// Open `path` and parse its projection block.
pub fn read_projection_file(path: &Path) -> Result<Option<Projection>> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sheet = Workbook::open(path)?.sheet(SHT_EST_NAME)?;
    read_projection(&sheet, &source)
}

/// Schema check used before writing a snapshot.
pub fn projection_schema() -> Vec<(String, DataType)> {
    PROJ_COLUMN_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let dtype = if i == 0 { DataType::Date } else { DataType::Float32 };
            (name.to_string(), dtype)
        })
        .chain(std::iter::once((YR_QTR_NAME.to_string(), DataType::String)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Sheet;
    use crate::table::{date_column, dates, float_column, floats, schema_of, str_column, strings};
    use polars::prelude::df;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn names(t: &DataFrame) -> Vec<String> {
        schema_of(t).into_iter().map(|(n, _)| n).collect()
    }

    /// An `ESTIMATES&PEs` sheet as of 2023-03-20 with two actual quarters.
    fn estimates_sheet() -> Sheet {
        let mut sh = Sheet::new(SHT_EST_NAME);
        sh.set_a1("A", 3, "Data as of the close of:");
        sh.set_a1("D", 3, d(2023, 3, 20));
        sh.set_a1("D", 4, 3951.57);

        sh.set_a1("A", 6, "ESTIMATES");
        sh.set_a1("A", 7, "12/31/2023");
        sh.set_a1("C", 7, 60.1);
        sh.set_a1("A", 8, "09/30/2023");
        sh.set_a1("C", 8, 55.2);

        sh.set_a1("A", 10, "12/30/2022");
        sh.set_a1("B", 10, 3839.5);
        sh.set_a1("A", 12, "ACTUALS");
        sh.set_a1("A", 13, "12/30/2022");
        sh.set_a1("B", 13, 3839.5);
        sh.set_a1("C", 13, 47.4);
        sh.set_a1("A", 14, "09/30/2022");
        sh.set_a1("B", 14, 3585.62);
        sh.set_a1("C", 14, 44.4);

        sh.set_a1("A", 20, "QTR");
        sh.set_a1("B", 20, 2022.0);
        for (i, q) in ["Q1", "Q2", "Q3", "Q4"].iter().enumerate() {
            sh.set_a1("A", 21 + i as u32, *q);
            sh.set_a1("B", 21 + i as u32, 12.0 - i as f64);
        }
        sh
    }

    fn quarterly_sheet() -> Sheet {
        let mut sh = Sheet::new(SHT_QTR_NAME);
        sh.set_a1("A", 5, "END");
        sh.set_a1("A", 6, d(2022, 12, 31));
        sh.set_a1("B", 6, 17.0);
        sh.set_a1("A", 7, d(2022, 9, 30));
        sh.set_a1("B", 7, 16.5);
        sh
    }

    fn rate_sheet() -> Sheet {
        let mut sh = Sheet::new("FRED Graph");
        sh.set_a1("A", 12, d(2022, 9, 30));
        sh.set_a1("B", 12, 1.67);
        sh.set_a1("A", 13, d(2022, 12, 30));
        sh.set_a1("B", 13, 1.58);
        sh
    }

    /// A `SECTOR EPS` sheet: 48 operating rows, a divider, 48 as-reported
    /// rows. The first sector of each half is Energy.
    fn sector_sheet() -> Sheet {
        let mut sh = Sheet::new(SHT_IND_NAME);
        sh.set_a1("A", 4, "INDEX NAME");
        sh.set_a1("C", 4, "2022 Q4");
        sh.set_a1("D", 4, "2022 Q3");
        let mut row = 6;
        for prefix in [0.0, 100.0] {
            for i in 0..48u32 {
                let name = if i == 0 { "Energy (XLE)".to_string() } else { format!("Sector {:02}", i) };
                sh.set_a1("A", row, name.as_str());
                sh.set_a1("B", row, 650.0);
                sh.set_a1("C", row, prefix + 20.0 + i as f64);
                sh.set_a1("D", row, prefix + 10.0 + i as f64);
                row += 1;
            }
            if prefix == 0.0 {
                sh.set_a1("A", row, "As Reported Earnings Per Share by Economic Sector");
                row += 1;
            }
        }
        sh
    }

    fn build(est: &Sheet, sectors: Option<&Sheet>) -> Result<DataFrame> {
        let (qtr, rates) = (quarterly_sheet(), rate_sheet());
        build_history(&HistorySheets {
            estimates: est,
            quarterly: &qtr,
            sectors,
            rates: &rates,
        })
    }

    fn assert_null_date(err: anyhow::Error, context: &str) {
        match err.downcast_ref::<ExtractError>() {
            Some(ExtractError::NullDate { context: c }) => assert!(c.contains(context), "{}", c),
            other => panic!("expected a missing date, got {:?}", other),
        }
    }

    #[test]
    fn builds_one_row_per_quarter() {
        let t = build(&estimates_sheet(), None).unwrap();

        assert_eq!(strings(&t, YR_QTR_NAME).unwrap(), vec![s("2022-Q3"), s("2022-Q4"), s("2023-Q1")]);
        assert_eq!(
            &names(&t)[..12],
            &[
                "date", "price", "op_eps", "rep_eps", "op_p/e", "rep_p/e", "12m_op_eps",
                "12m_rep_eps", "yr_qtr", "real_int_rate", "op_margin", "date_right"
            ]
        );
        assert_eq!(floats(&t, "price").unwrap(), vec![Some(3585.62), Some(3839.5), Some(3951.57)]);
        assert_eq!(floats(&t, "op_eps").unwrap(), vec![Some(44.4), Some(47.4), None]);
        assert_eq!(floats(&t, "real_int_rate").unwrap(), vec![Some(1.67), Some(1.58), None]);
        assert_eq!(floats(&t, "op_margin").unwrap(), vec![Some(10.0), Some(9.0), None]);
        assert_eq!(floats(&t, "div_ps").unwrap(), vec![Some(16.5), Some(17.0), None]);
    }

    #[test]
    fn missing_as_of_date_is_fatal() {
        let mut est = estimates_sheet();
        est.set_a1("D", 3, "pending");
        assert_null_date(build(&est, None).unwrap_err(), "as-of date");
    }

    #[test]
    fn undated_actuals_row_is_fatal() {
        let mut est = estimates_sheet();
        est.set_a1("A", 14, "revised");
        assert_null_date(build(&est, None).unwrap_err(), "actuals block");
    }

    #[test]
    fn undated_price_row_is_fatal() {
        let mut est = estimates_sheet();
        est.set_a1("A", 10, "pending");
        assert_null_date(build(&est, None).unwrap_err(), "price rows");
    }

    #[test]
    fn sector_earnings_join_on_their_quarter() {
        let sectors = sector_sheet();
        let t = build(&estimates_sheet(), Some(&sectors)).unwrap();

        assert_eq!(strings(&t, YR_QTR_NAME).unwrap(), vec![s("2022-Q3"), s("2022-Q4"), s("2023-Q1")]);
        assert_eq!(floats(&t, "op_E Energy").unwrap(), vec![Some(10.0), Some(20.0), None]);
        assert_eq!(floats(&t, "rep_E Energy").unwrap(), vec![Some(110.0), Some(120.0), None]);
        assert_eq!(floats(&t, "op_E Sector 47").unwrap(), vec![Some(57.0), Some(67.0), None]);
        assert!(names(&t).iter().all(|n| !n.starts_with("op_E As Reported")));
        // the other joins are unaffected
        assert_eq!(floats(&t, "div_ps").unwrap(), vec![Some(16.5), Some(17.0), None]);
    }

    #[test]
    fn collapse_prefers_latest_row_and_fills_nulls() {
        let t = DataFrame::new(vec![
            date_column("date", &[Some(d(2022, 12, 30)), Some(d(2022, 12, 31)), Some(d(2023, 3, 1))]).unwrap(),
            float_column("price", vec![Some(1.0), None, Some(3.0)]),
            float_column("eps", vec![Some(10.0), Some(20.0), None]),
            str_column("yr_qtr", vec![s("2022-Q4"), s("2022-Q4"), s("2023-Q1")]),
        ])
        .unwrap();
        let c = collapse_quarters(&t, "yr_qtr", "date").unwrap();
        assert_eq!(c.height(), 2);
        assert_eq!(names(&c), vec!["date", "price", "eps", "yr_qtr"]);
        assert_eq!(dates(&c, "date").unwrap()[0], Some(d(2022, 12, 31)));
        assert_eq!(floats(&c, "price").unwrap(), vec![Some(1.0), Some(3.0)]);
        assert_eq!(floats(&c, "eps").unwrap(), vec![Some(20.0), None]);
    }

    #[test]
    fn fold_never_erases_persisted_values() {
        let persisted = df![
            "yr_qtr" => [Some("2022-Q3"), Some("2022-Q4")],
            "price" => [Some(3585.6f32), Some(3839.5)],
            "legacy" => [Some(1.0f32), Some(2.0)],
        ]
        .unwrap();
        let fresh = df![
            "yr_qtr" => [Some("2022-Q4"), Some("2023-Q1")],
            "price" => [None, Some(3951.6f32)],
            "op_margin" => [Some(9.0f32), None],
        ]
        .unwrap();

        let f = fold_history(&persisted, &fresh, "yr_qtr").unwrap();
        assert_eq!(names(&f), vec!["yr_qtr", "price", "legacy", "op_margin"]);
        assert_eq!(strings(&f, "yr_qtr").unwrap(), vec![s("2022-Q3"), s("2022-Q4"), s("2023-Q1")]);
        assert_eq!(floats(&f, "price").unwrap(), vec![Some(3585.6), Some(3839.5), Some(3951.6)]);
        assert_eq!(floats(&f, "legacy").unwrap(), vec![Some(1.0), Some(2.0), None]);
        assert_eq!(floats(&f, "op_margin").unwrap(), vec![None, Some(9.0), None]);
    }

    #[test]
    fn fold_rejects_type_conflicts_and_repeated_quarters() {
        let persisted = df!["yr_qtr" => [Some("2022-Q4")], "price" => [Some("n/a")]].unwrap();
        let fresh = df!["yr_qtr" => [Some("2022-Q4")], "price" => [Some(1.0f32)]].unwrap();
        assert!(fold_history(&persisted, &fresh, "yr_qtr").is_err());

        let repeated = df!["yr_qtr" => [Some("2022-Q4"), Some("2022-Q4")], "price" => [Some(1.0f32), None]].unwrap();
        assert!(fold_history(&repeated, &fresh, "yr_qtr").is_err());
    }

    #[test]
    fn fold_drops_rows_without_a_quarter() {
        let persisted = df!["yr_qtr" => [Some("2022-Q4"), None], "price" => [Some(1.0f32), Some(2.0)]].unwrap();
        let fresh = df!["yr_qtr" => [Some("2023-Q1")], "price" => [Some(3.0f32)]].unwrap();
        let f = fold_history(&persisted, &fresh, "yr_qtr").unwrap();
        assert_eq!(strings(&f, "yr_qtr").unwrap(), vec![s("2022-Q4"), s("2023-Q1")]);
    }

    #[test]
    fn projection_skips_undated_rows() {
        let p = read_projection(&estimates_sheet(), "rpt 2023 03 20.xlsx").unwrap().unwrap();
        assert_eq!(p.as_of, d(2023, 3, 20));
        assert_eq!(strings(&p.table, YR_QTR_NAME).unwrap(), vec![s("2023-Q4"), s("2023-Q3")]);
        assert_eq!(schema_of(&p.table), projection_schema());

        let mut est = estimates_sheet();
        est.set_a1("A", 8, "2024 est.");
        assert!(read_projection(&est, "rpt 2023 03 20.xlsx").unwrap().is_none());
    }
}
