// src/parse/mod.rs

pub mod actuals;
pub mod date_pair;
pub mod layout;
pub mod margins;
pub mod rates;
pub mod sectors;

use chrono::NaiveDate;

use crate::grid::CellValue;

pub use actuals::read_history_block;
pub use date_pair::{read_sp_date, DatePair};
pub use margins::read_margins;
pub use rates::read_rates;
pub use sectors::{read_sectors, SectorData};

/// Date part of a cell. Text is read from its first word as `%m/%d/%Y`
/// (the S&P convention) or `%Y-%m-%d`; numbers are not dates.
pub fn cell_to_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Text(s) => {
            let word = s.split_whitespace().next()?;
            NaiveDate::parse_from_str(word, "%m/%d/%Y")
                .or_else(|_| NaiveDate::parse_from_str(word, "%Y-%m-%d"))
                .ok()
        }
        CellValue::Number(_) | CellValue::Empty => None,
    }
}

/// Numeric value of a cell as `f32`; text such as `"1,234.5"` is parsed,
/// anything unparseable (`"#N/A"`, `"--"`) is null.
pub fn cell_to_float(cell: &CellValue) -> Option<f32> {
    match cell {
        CellValue::Number(v) => Some(*v as f32),
        CellValue::Text(s) => s.trim().replace(',', "").parse::<f32>().ok(),
        CellValue::Date(_) | CellValue::Empty => None,
    }
}

/// Cell rendered as a label: trimmed text, whole numbers without a
/// fractional part (`2024.0` → `"2024"`), dates as `YYYY-MM-DD`.
pub fn cell_to_label(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Text(s) if s.trim().is_empty() => None,
        CellValue::Text(s) => Some(s.trim().to_string()),
        CellValue::Number(v) if v.fract() == 0.0 => Some(format!("{}", *v as i64)),
        CellValue::Number(v) => Some(v.to_string()),
        CellValue::Date(dt) => Some(dt.date().to_string()),
        CellValue::Empty => None,
    }
}
