/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// A required column is absent from one of the input tables.
    #[error("schema error: table `{table}` is missing column(s): {}", .columns.join(", "))]
    Schema { table: String, columns: Vec<String> },

    #[error("schema error: column `{column}` already exists in table `{table}`")]
    ColumnConflict { table: String, column: String },

    /// Reconciling against an empty relation is a caller bug, not an empty result.
    #[error("relation table `{table}` is empty")]
    EmptyRelation { table: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_message_names_table_and_columns() {
        let e = DataError::Schema {
            table: "records".into(),
            columns: vec!["RIC".into(), "PeriodEndDate".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("`records`"));
        assert!(msg.contains("RIC, PeriodEndDate"));
    }

    #[test]
    fn empty_relation_message_names_table() {
        let e = DataError::EmptyRelation {
            table: "relation".into(),
        };
        assert_eq!(e.to_string(), "relation table `relation` is empty");
    }
}
