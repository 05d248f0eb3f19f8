/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use log::info;
use polars::prelude::*;

use crate::error::Result;
use crate::schema::require_columns;

/// Column names of a validity-window table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowColumns {
    pub key: String,
    pub first: String,
    pub last: String,
}

impl WindowColumns {
    pub fn new(key: impl Into<String>, first: impl Into<String>, last: impl Into<String>) -> Self {
        WindowColumns {
            key: key.into(),
            first: first.into(),
            last: last.into(),
        }
    }
}

impl Default for WindowColumns {
    fn default() -> Self {
        WindowColumns::new("OrganizationID", "firstdt", "lastdt")
    }
}

/// Days since epoch of a date or datetime column.
pub(crate) fn day_number(name: &str) -> Expr {
    col(name).cast(DataType::Date).cast(DataType::Int32)
}

/// `first - buffer_days <= date <= last`; null on any side never matches.
pub fn window_contains(date: &str, first: &str, last: &str, buffer_days: i32) -> Expr {
    let day = day_number(date);
    let lower = day_number(first) - lit(buffer_days);
    lower
        .lt_eq(day.clone())
        .and(day.lt_eq(day_number(last)))
}

/// First and last observed `date` per `key`, e.g. the span of fiscal period
/// ends an organization has fundamentals for.
pub fn derive_validity_windows(
    observations: &DataFrame,
    date: &str,
    columns: &WindowColumns,
) -> Result<DataFrame> {
    require_columns(observations, "observations", &[columns.key.as_str(), date])?;

    let out = observations
        .clone()
        .lazy()
        .filter(col(columns.key.as_str()).is_not_null().and(col(date).is_not_null()))
        .group_by([col(columns.key.as_str())])
        .agg([
            col(date).min().alias(columns.first.as_str()),
            col(date).max().alias(columns.last.as_str()),
        ])
        .sort([columns.key.as_str()], Default::default())
        .collect()?;

    info!(
        "derived {} validity window(s) from {} observation(s)",
        out.height(),
        observations.height()
    );
    Ok(out)
}

/// One window per key: earliest first date, latest last date.
pub(crate) fn collapse_windows(windows: &DataFrame, columns: &WindowColumns) -> LazyFrame {
    windows
        .clone()
        .lazy()
        .filter(col(columns.key.as_str()).is_not_null())
        .group_by([col(columns.key.as_str())])
        .agg([
            col(columns.first.as_str()).min(),
            col(columns.last.as_str()).max(),
        ])
}
