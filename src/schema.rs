/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use polars::prelude::DataFrame;

use crate::error::{DataError, Result};

#[inline]
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Fail with `DataError::Schema` listing every column of `required` that `df` lacks.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, table: &str, required: &[S]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !has_column(df, c))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::Schema {
            table: table.to_string(),
            columns: missing,
        })
    }
}

/// Fail with `DataError::ColumnConflict` if `df` already carries `column`.
pub fn forbid_column(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    if has_column(df, column) {
        Err(DataError::ColumnConflict {
            table: table.to_string(),
            column: column.to_string(),
        })
    } else {
        Ok(())
    }
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_owned()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Reject index/variable lists that share a column.
pub fn ensure_disjoint(index: &[String], variables: &[String]) -> Result<()> {
    if let Some(shared) = index.iter().find(|c| variables.contains(c)) {
        return Err(DataError::InvalidArgument(format!(
            "column `{shared}` is listed both as index and as variable column"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df![
            "RIC" => ["ABC.ST", "DEF.ST"],
            "val" => [Some(1.0), None],
        ]
        .unwrap()
    }

    #[test]
    fn require_columns_reports_all_missing() {
        let err = require_columns(&frame(), "records", &["RIC", "PeriodEndDate", "x"]).unwrap_err();
        match err {
            DataError::Schema { table, columns } => {
                assert_eq!(table, "records");
                assert_eq!(columns, vec!["PeriodEndDate".to_string(), "x".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_columns_ok_when_present() {
        assert!(require_columns(&frame(), "records", &["RIC", "val"]).is_ok());
    }

    #[test]
    fn forbid_column_detects_conflict() {
        assert!(forbid_column(&frame(), "records", "OrganizationID").is_ok());
        assert!(matches!(
            forbid_column(&frame(), "records", "RIC"),
            Err(DataError::ColumnConflict { .. })
        ));
    }

    #[test]
    fn overlapping_lists_are_rejected() {
        let idx = vec!["a".to_string(), "b".to_string()];
        assert!(ensure_disjoint(&idx, &["c".to_string()]).is_ok());
        assert!(ensure_disjoint(&idx, &["b".to_string()]).is_err());
    }
}
