// src/grid/mod.rs

pub mod block;
pub mod locate;

use chrono::{NaiveDate, NaiveDateTime};

pub use block::extract_block;
pub use locate::{anchor_col, anchor_row, locate_col, locate_row, Labels};

/// A raw cell as read from a worksheet. No coercion happens at this level.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

/// Read-only, 1-based view of a worksheet.
///
/// Rows and columns follow the spreadsheet convention: row 1 / column 1 is
/// cell `A1`. Anything outside `max_row` × `max_column` reads as empty.
pub trait Grid {
    fn name(&self) -> &str;
    fn value_at(&self, row: u32, col: u32) -> &CellValue;
    fn max_row(&self) -> u32;
    fn max_column(&self) -> u32;

    /// Address a cell by column letters and row number, e.g. `("D", 5)`.
    fn value_at_a1(&self, column: &str, row: u32) -> &CellValue {
        self.value_at(row, column_number(column))
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// In-memory grid; what the workbook adapter loads a worksheet into.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    /// Build from row-major values; `rows[0][0]` lands in `A1`.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            cells: rows,
        }
    }

    /// Set a 1-based cell, growing the grid as needed. Row or column 0 is ignored.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        if row == 0 || col == 0 {
            return;
        }
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.cells.len() <= r {
            self.cells.resize_with(r + 1, Vec::new);
        }
        let line = &mut self.cells[r];
        if line.len() <= c {
            line.resize(c + 1, CellValue::Empty);
        }
        line[c] = value.into();
    }

    /// Same as [`Sheet::set`] with an A1-style column.
    pub fn set_a1(&mut self, column: &str, row: u32, value: impl Into<CellValue>) {
        self.set(row, column_number(column), value);
    }
}

impl Grid for Sheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_at(&self, row: u32, col: u32) -> &CellValue {
        if row == 0 || col == 0 {
            return &EMPTY;
        }
        self.cells
            .get(row as usize - 1)
            .and_then(|line| line.get(col as usize - 1))
            .unwrap_or(&EMPTY)
    }

    fn max_row(&self) -> u32 {
        self.cells.len() as u32
    }

    fn max_column(&self) -> u32 {
        self.cells.iter().map(Vec::len).max().unwrap_or(0) as u32
    }
}

/// `"A"` → 1, `"J"` → 10, `"AA"` → 27. Returns 0 for anything that is not
/// a column reference.
pub const fn column_number(letters: &str) -> u32 {
    let bytes = letters.as_bytes();
    if bytes.is_empty() {
        return 0;
    }
    let mut n = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i].to_ascii_uppercase();
        if b < b'A' || b > b'Z' {
            return 0;
        }
        n = n * 26 + (b - b'A' + 1) as u32;
        i += 1;
    }
    n
}

/// Inverse of [`column_number`]; 0 maps to an empty string.
pub fn column_letter(mut n: u32) -> String {
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
