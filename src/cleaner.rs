/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

//! Two-pass null filtering plus duplicate resolution over a record set.
//!
//! Pass 1 drops rows with a null in *any* index column, pass 2 drops rows
//! whose variable columns are *all* null, pass 3 removes duplicates. `clean`
//! only removes literal full-row duplicates; `clean_keyed` collapses every
//! index key down to its most complete row.

use log::{debug, info};
use polars::prelude::*;
use serde::Serialize;

use crate::error::{DataError, Result};
use crate::schema::{ensure_disjoint, require_columns};
use crate::windows::day_number;

/// Secondary ordering used by `clean_keyed` when two rows of the same key
/// carry the same number of non-null variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieBreak {
    /// Order by a column; nulls always sort last.
    Column { name: String, descending: bool },
    /// Prefer the row whose two date columns are closest to each other.
    DateGap { left: String, right: String },
}

impl TieBreak {
    pub fn asc(name: impl Into<String>) -> Self {
        TieBreak::Column {
            name: name.into(),
            descending: false,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        TieBreak::Column {
            name: name.into(),
            descending: true,
        }
    }

    pub fn date_gap(left: impl Into<String>, right: impl Into<String>) -> Self {
        TieBreak::DateGap {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            TieBreak::Column { name, .. } => vec![name.as_str()],
            TieBreak::DateGap { left, right } => vec![left.as_str(), right.as_str()],
        }
    }

    fn expr(&self) -> Expr {
        match self {
            TieBreak::Column { name, .. } => col(name.as_str()),
            TieBreak::DateGap { left, right } => {
                let diff = day_number(left) - day_number(right);
                when(diff.clone().lt(lit(0)))
                    .then(lit(0) - diff.clone())
                    .otherwise(diff)
            }
        }
    }

    fn descending(&self) -> bool {
        match self {
            TieBreak::Column { descending, .. } => *descending,
            TieBreak::DateGap { .. } => false,
        }
    }
}

/// Row counts around each cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub null_index_dropped: usize,
    pub empty_payload_dropped: usize,
    pub duplicates_dropped: usize,
    pub rows_out: usize,
}

#[derive(Debug, Clone)]
pub struct RecordCleaner {
    index: Vec<String>,
    variables: Vec<String>,
    tie_breaks: Vec<TieBreak>,
    table: String,
}

impl RecordCleaner {
    pub fn new<I, V, S, T>(index: I, variables: V) -> Self
    where
        I: IntoIterator<Item = S>,
        V: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        RecordCleaner {
            index: index.into_iter().map(Into::into).collect(),
            variables: variables.into_iter().map(Into::into).collect(),
            tie_breaks: Vec::new(),
            table: "records".to_string(),
        }
    }

    pub fn with_tie_breaks(mut self, tie_breaks: Vec<TieBreak>) -> Self {
        self.tie_breaks = tie_breaks;
        self
    }

    /// Name used for this table in schema errors.
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn validate(&self, df: &DataFrame) -> Result<()> {
        ensure_disjoint(&self.index, &self.variables)?;
        let mut required: Vec<&str> = self.index.iter().map(String::as_str).collect();
        required.extend(self.variables.iter().map(String::as_str));
        for tb in &self.tie_breaks {
            required.extend(tb.columns());
        }
        require_columns(df, &self.table, &required)
    }

    /// Passes 1 and 2.
    fn drop_unusable(&self, df: &DataFrame, report: &mut CleanReport) -> Result<DataFrame> {
        let mut out = df.clone();

        if let Some(keep) = all_not_null(&self.index) {
            out = out.lazy().filter(keep).collect()?;
        }
        report.null_index_dropped = report.rows_in - out.height();
        debug!(
            "{}: dropped {} row(s) with a null index column",
            self.table, report.null_index_dropped
        );

        let before = out.height();
        if let Some(keep) = any_not_null(&self.variables) {
            out = out.lazy().filter(keep).collect()?;
        }
        report.empty_payload_dropped = before - out.height();
        debug!(
            "{}: dropped {} row(s) with every variable column null",
            self.table, report.empty_payload_dropped
        );

        Ok(out)
    }

    /// Drop unusable rows and literal duplicates; output is ordered by
    /// (index + variables), nulls last.
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        self.clean_with_report(df).map(|(out, _)| out)
    }

    pub fn clean_with_report(&self, df: &DataFrame) -> Result<(DataFrame, CleanReport)> {
        self.validate(df)?;
        let mut report = CleanReport {
            rows_in: df.height(),
            ..Default::default()
        };

        let usable = self.drop_unusable(df, &mut report)?;
        let order: Vec<Expr> = self
            .index
            .iter()
            .chain(self.variables.iter())
            .map(|c| col(c.as_str()))
            .collect();
        let sorted = if order.is_empty() {
            usable
        } else {
            usable
                .lazy()
                .sort_by_exprs(
                    order,
                    SortMultipleOptions::default()
                        .with_nulls_last(true)
                        .with_maintain_order(true),
                )
                .collect()?
        };

        let out = sorted.unique_stable(None, UniqueKeepStrategy::First, None)?;
        report.duplicates_dropped = sorted.height() - out.height();
        report.rows_out = out.height();

        info!(
            "{}: cleaned {} -> {} row(s) ({} null index, {} empty payload, {} duplicate)",
            self.table,
            report.rows_in,
            report.rows_out,
            report.null_index_dropped,
            report.empty_payload_dropped,
            report.duplicates_dropped
        );
        Ok((out, report))
    }

    /// Like `clean`, but keep one row per index key: the one with the most
    /// non-null variable columns, then by tie-breaks, then by the variables
    /// themselves so the winner never depends on input order.
    pub fn clean_keyed(&self, df: &DataFrame) -> Result<DataFrame> {
        self.clean_keyed_with_report(df).map(|(out, _)| out)
    }

    pub fn clean_keyed_with_report(&self, df: &DataFrame) -> Result<(DataFrame, CleanReport)> {
        if self.index.is_empty() {
            return Err(DataError::InvalidArgument(
                "keyed cleaning needs at least one index column".into(),
            ));
        }
        self.validate(df)?;
        let mut report = CleanReport {
            rows_in: df.height(),
            ..Default::default()
        };

        let usable = self.drop_unusable(df, &mut report)?;

        let mut order: Vec<Expr> = self.index.iter().map(|c| col(c.as_str())).collect();
        let mut descending = vec![false; order.len()];
        if let Some(filled) = non_null_count(&self.variables) {
            order.push(filled);
            descending.push(true);
        }
        for tb in &self.tie_breaks {
            order.push(tb.expr());
            descending.push(tb.descending());
        }
        for v in &self.variables {
            order.push(col(v.as_str()));
            descending.push(false);
        }

        let sorted = usable
            .lazy()
            .sort_by_exprs(
                order,
                SortMultipleOptions::default()
                    .with_order_descending_multi(descending)
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            )
            .collect()?;

        let out = sorted.unique_stable(
            Some(self.index.as_slice()),
            UniqueKeepStrategy::First,
            None,
        )?;
        report.duplicates_dropped = sorted.height() - out.height();
        report.rows_out = out.height();

        info!(
            "{}: collapsed {} -> {} row(s) on key [{}]",
            self.table,
            report.rows_in,
            report.rows_out,
            self.index.join(", ")
        );
        Ok((out, report))
    }
}

fn all_not_null(columns: &[String]) -> Option<Expr> {
    columns
        .iter()
        .map(|c| col(c.as_str()).is_not_null())
        .reduce(|a, b| a.and(b))
}

fn any_not_null(columns: &[String]) -> Option<Expr> {
    columns
        .iter()
        .map(|c| col(c.as_str()).is_not_null())
        .reduce(|a, b| a.or(b))
}

/// Number of non-null cells among `columns`, per row; `None` for no columns.
fn non_null_count(columns: &[String]) -> Option<Expr> {
    columns
        .iter()
        .map(|c| col(c.as_str()).is_not_null().cast(DataType::UInt32))
        .reduce(|a, b| a + b)
}
