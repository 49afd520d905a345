//! Fixed sheet geometry of the S&P index-earnings workbook and the FRED
//! DFII10 download. Only the anchors' labels and relative offsets are
//! fixed; absolute rows are always found by searching.

use crate::grid::column_number as col;

pub const YR_QTR_NAME: &str = "yr_qtr";
pub const RR_COL_NAME: &str = "real_int_rate";
pub const MARGIN_COL_NAME: &str = "op_margin";

pub const SHT_EST_NAME: &str = "ESTIMATES&PEs";
pub const SHT_QTR_NAME: &str = "QUARTERLY DATA";
pub const SHT_IND_NAME: &str = "SECTOR EPS";

pub const COLUMN_NAMES: &[&str] = &[
    "date",
    "price",
    "op_eps",
    "rep_eps",
    "op_p/e",
    "rep_p/e",
    "12m_op_eps",
    "12m_rep_eps",
];

pub const PROJ_COLUMN_NAMES: &[&str] = &[
    "date",
    "op_eps",
    "rep_eps",
    "op_p/e",
    "rep_p/e",
    "12m_op_eps",
    "12m_rep_eps",
];

pub const COLUMN_NAMES_QTR: &[&str] = &["date", "div_ps", "sales_ps", "bk_val_ps", "capex_ps", "divisor"];

const DATE_KEYS: &[&str] = &["Date", "Data as of the close of:"];

/// As-of date (and optionally the two most recent prices) at the top of a sheet.
#[derive(Debug, Clone, Copy)]
pub struct DatePairLayout {
    /// Labels in column A marking the as-of row. `None` is a configuration error.
    pub date_labels: Option<&'static [&'static str]>,
    /// Column holding the as-of date (and, one row down, its price).
    pub value_col: u32,
    /// Labels marking the row two below the second date/price pair.
    pub price_labels: Option<&'static [&'static str]>,
    pub price_col: u32,
    /// Names of the date and price columns in the returned table.
    pub column_names: [&'static str; 2],
}

pub const EST_DATE: DatePairLayout = DatePairLayout {
    date_labels: Some(DATE_KEYS),
    value_col: col("D"),
    price_labels: Some(&["ACTUALS"]),
    price_col: col("B"),
    column_names: ["date", "price"],
};

pub const PROJ_DATE: DatePairLayout = DatePairLayout {
    date_labels: Some(DATE_KEYS),
    value_col: col("D"),
    price_labels: None,
    price_col: 0,
    column_names: ["date", "price"],
};

/// A block of rows starting right below a label in the first column.
#[derive(Debug, Clone, Copy)]
pub struct BlockLayout {
    pub labels: &'static [&'static str],
    pub first_col: u32,
    pub last_col: u32,
    /// Column offsets (0 = `first_col`) left out of the block.
    pub skip: &'static [usize],
    /// Fixed block height; `None` reads until the first blank cell in `first_col`.
    pub num_rows: Option<u32>,
    /// First name is the date column, the rest are floats.
    pub column_names: &'static [&'static str],
}

pub const SHT_HIST: BlockLayout = BlockLayout {
    labels: &["ACTUALS", "Actuals"],
    first_col: col("A"),
    last_col: col("J"),
    skip: &[4, 7],
    num_rows: None,
    column_names: COLUMN_NAMES,
};

pub const SHT_QTR: BlockLayout = BlockLayout {
    labels: &["END"],
    first_col: col("A"),
    last_col: col("I"),
    skip: &[2, 3, 7],
    num_rows: None,
    column_names: COLUMN_NAMES_QTR,
};

pub const SHT_EST_PROJ: BlockLayout = BlockLayout {
    labels: &["ESTIMATES"],
    first_col: col("A"),
    last_col: col("J"),
    skip: &[1, 4, 7],
    num_rows: None,
    column_names: PROJ_COLUMN_NAMES,
};

/// Operating margins: a header row of years under a `QTR` label and one
/// row per quarter below it.
#[derive(Debug, Clone, Copy)]
pub struct MarginLayout {
    pub labels: &'static [&'static str],
    pub first_col: u32,
    /// Data rows below the header row.
    pub data_rows: u32,
}

pub const SHT_BC_MARG: MarginLayout = MarginLayout {
    labels: &["QTR"],
    first_col: col("A"),
    data_rows: 4,
};

/// Sector earnings block under an `INDEX NAME` header of encoded quarters.
#[derive(Debug, Clone, Copy)]
pub struct SectorLayout {
    pub labels: &'static [&'static str],
    pub first_col: u32,
    pub start_row_data_offset: u32,
    pub stop_row_data_offset: u32,
    /// Rows per earnings type (operating, then as-reported).
    pub num_inds: usize,
    /// Divider rows dropped from the block.
    pub dividers: &'static [&'static str],
}

pub const SHT_BC_IND: SectorLayout = SectorLayout {
    labels: &["INDEX NAME"],
    first_col: col("A"),
    start_row_data_offset: 2,
    stop_row_data_offset: 107,
    num_inds: 48,
    dividers: &["As Reported Earnings Per Share by Economic Sector"],
};

/// FRED download: dates in one column, values in the next, to the end of the sheet.
#[derive(Debug, Clone, Copy)]
pub struct RateLayout {
    pub first_row: u32,
    pub date_col: u32,
    pub value_col: u32,
}

pub const SHT_FRED: RateLayout = RateLayout {
    first_row: 12,
    date_col: col("A"),
    value_col: col("B"),
};
