// src/table/mod.rs

//! Column helpers and frame operations on polars `DataFrame`s.
//!
//! Every table built here holds three column types: `Date`, `Float32`
//! and `String`. Keys are `String` columns such as `yr_qtr`.

pub mod parquet;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::quarter::date_to_quarter_key;

/// Days from 0001-01-01 to 1970-01-01, the epoch of a polars `Date`.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn date_column(name: &str, values: &[Option<NaiveDate>]) -> Result<Column> {
    let days: Vec<Option<i32>> = values
        .iter()
        .map(|d| d.map(|d| d.num_days_from_ce() - EPOCH_DAYS_FROM_CE))
        .collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .with_context(|| format!("building date column `{}`", name))
}

pub fn float_column(name: &str, values: Vec<Option<f32>>) -> Column {
    Column::new(name.into(), values)
}

pub fn str_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::new(name.into(), values)
}

/// Zero-row frame with the given schema.
pub fn empty(schema: &[(&str, DataType)]) -> Result<DataFrame> {
    let columns = schema
        .iter()
        .map(|(name, dtype)| Column::full_null((*name).into(), 0, dtype))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Column names and types, in order.
pub fn schema_of(df: &DataFrame) -> Vec<(String, DataType)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.dtype().clone()))
        .collect()
}

pub fn dates(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let column = df.column(name)?;
    if column.dtype() != &DataType::Date {
        bail!("column `{}` is {}, not date", name, column.dtype());
    }
    let days = column.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + EPOCH_DAYS_FROM_CE)))
        .collect())
}

pub fn floats(df: &DataFrame, name: &str) -> Result<Vec<Option<f32>>> {
    Ok(df.column(name)?.f32()?.into_iter().collect())
}

pub fn strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|s| s.map(str::to_string))
        .collect())
}

/// Add a `YYYY-Qn` string column derived from date column `date_col`.
pub fn with_quarter_key(mut df: DataFrame, date_col: &str, key_col: &str) -> Result<DataFrame> {
    if df.column(key_col).is_ok() {
        bail!("column `{}` already exists", key_col);
    }
    let keys = dates(&df, date_col)?
        .into_iter()
        .map(|d| d.map(date_to_quarter_key))
        .collect();
    df.with_column(str_column(key_col, keys))?;
    Ok(df)
}

/// Fails when a non-null value of `key` occurs more than once.
pub fn require_unique(df: &DataFrame, key: &str) -> Result<()> {
    let keys = df.column(key)?.as_materialized_series().drop_nulls();
    if keys.n_unique()? != keys.len() {
        bail!("more than one row per `{}`", key);
    }
    Ok(())
}

/// Left join `right` onto `left` on the string column `key`.
///
/// Every left row is kept. The key appears once; other right columns whose
/// name is taken on the left get a `_right` suffix. Right keys must be unique.
pub fn left_join(left: &DataFrame, right: &DataFrame, key: &str) -> Result<DataFrame> {
    require_unique(right, key).context("right side of join")?;
    let joined = left
        .clone()
        .lazy()
        .join(
            right.clone().lazy(),
            [col(key)],
            [col(key)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(joined)
}

/// Stack `bottom` under `top` on the union of their columns (top's order
/// first). A column missing on one side is null there; a column on both
/// sides must have the same type.
pub fn concat_diagonal(top: &DataFrame, bottom: &DataFrame) -> Result<DataFrame> {
    let stacked = concat(
        [top.clone().lazy(), bottom.clone().lazy()],
        UnionArgs {
            diagonal: true,
            ..Default::default()
        },
    )?
    .collect()?;
    Ok(stacked)
}

/// One row per `key`. Rows are ranked by `order_by` when given (a null
/// ranks first, ties keep row order), else by row order, and the last one
/// wins. With `fill_nulls` each column takes its last non-null value
/// instead. Rows with a null key are dropped; the result is sorted by `key`
/// and keeps the input's column order.
pub fn group_last(
    df: &DataFrame,
    key: &str,
    order_by: Option<&str>,
    fill_nulls: bool,
) -> Result<DataFrame> {
    let names = df.get_column_names_owned();
    let aggs: Vec<Expr> = names
        .iter()
        .filter(|n| n.as_str() != key)
        .map(|n| {
            let mut e = col(n.clone());
            if let Some(order_by) = order_by {
                e = e.sort_by(
                    [col(order_by)],
                    SortMultipleOptions::default().with_maintain_order(true),
                );
            }
            if fill_nulls {
                e = e.drop_nulls();
            }
            e.last()
        })
        .collect();
    let order: Vec<Expr> = names.iter().map(|n| col(n.clone())).collect();

    let out = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg(aggs)
        .sort([key], SortMultipleOptions::default())
        .select(order)
        .collect()?;
    Ok(out)
}

/// Keep the row with the latest `order_by` date per `key`.
pub fn last_by(df: &DataFrame, key: &str, order_by: &str) -> Result<DataFrame> {
    group_last(df, key, Some(order_by), false)
}
