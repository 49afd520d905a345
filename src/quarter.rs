// src/quarter.rs

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{fmt, str::FromStr};

/// `<prefix> YYYY MM DD.xlsx`, e.g. `sp-500-eps-est 2023 03 20.xlsx`.
static SOURCE_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<prefix>\S+) (?P<date>\d{4} \d{2} \d{2})\.xlsx$").expect("static regex")
});

/// Calendar quarter, ordered by (year, quarter). Displays as `YYYY-Qn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearQuarter {
    pub year: i32,
    pub quarter: u8,
}

impl YearQuarter {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: ((date.month() - 1) / 3 + 1) as u8,
        }
    }

    pub fn is_fourth(&self) -> bool {
        self.quarter == 4
    }
}

impl fmt::Display for YearQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-Q{}", self.year, self.quarter)
    }
}

impl FromStr for YearQuarter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, quarter) = s
            .split_once("-Q")
            .ok_or_else(|| anyhow!("`{}` is not a YYYY-Qn quarter key", s))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("bad year in quarter key `{}`", s))?;
        let quarter: u8 = quarter
            .parse()
            .with_context(|| format!("bad quarter in quarter key `{}`", s))?;
        if year.to_string().len() != 4 || !(1..=4).contains(&quarter) {
            return Err(anyhow!("`{}` is not a YYYY-Qn quarter key", s));
        }
        Ok(Self { year, quarter })
    }
}

/// `2023-02-14` → `"2023-Q1"`.
pub fn date_to_quarter_key(date: NaiveDate) -> String {
    YearQuarter::from_date(date).to_string()
}

/// `"2023-Q1"` → `"2023"`.
pub fn year_of(key: &str) -> &str {
    key.get(..4).unwrap_or(key)
}

pub fn is_fourth_quarter(key: &str) -> bool {
    key.ends_with('4')
}

/// Date embedded in a source file name: the part after the first space,
/// without its extension, read as `YYYY MM DD`.
pub fn date_from_file_name(file_name: &str) -> Result<NaiveDate> {
    let caps = SOURCE_FILE_NAME
        .captures(file_name)
        .ok_or_else(|| anyhow!("`{}` does not look like `<prefix> YYYY MM DD.xlsx`", file_name))?;
    NaiveDate::parse_from_str(&caps["date"], "%Y %m %d")
        .with_context(|| format!("invalid date in file name `{}`", file_name))
}

pub fn quarter_of_file(file_name: &str) -> Result<YearQuarter> {
    date_from_file_name(file_name).map(YearQuarter::from_date)
}

/// Name of the projection snapshot derived from a source file:
/// `sp-500-eps-est 2023 03 20.xlsx` → `sp-500-eps-est 2023-03-20.parquet`.
pub fn snapshot_file_name(source_file: &str) -> Result<String> {
    let caps = SOURCE_FILE_NAME
        .captures(source_file)
        .ok_or_else(|| anyhow!("`{}` does not look like `<prefix> YYYY MM DD.xlsx`", source_file))?;
    let date = date_from_file_name(source_file)?;
    Ok(format!("{} {}.parquet", &caps["prefix"], date.format("%Y-%m-%d")))
}
