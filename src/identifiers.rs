/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

//! Vendor quote identifiers are not stable: a delisted series gets a `^`
//! suffix (`ABC.ST^L12`), a new listing may carry an `IPO-` prefix, and ids
//! that went through a float column come back as `5044034256.0`.

use log::debug;
use polars::prelude::*;

use crate::error::Result;
use crate::schema::require_columns;

/// `^`, one uppercase letter, two digits (delisting month/year marker).
pub const DELISTING_SUFFIX: &str = r"\^[A-Z][0-9]{2}";
pub const IPO_PREFIX: &str = r"^IPO-";
const FLOAT_ARTEFACT: &str = r"\.0$";

/// Expression stripping the delisting suffix and IPO prefix off `name`.
pub fn normalized_key(name: &str) -> Expr {
    col(name)
        .cast(DataType::String)
        .str()
        .replace_all(lit(DELISTING_SUFFIX), lit(""), false)
        .str()
        .replace_all(lit(IPO_PREFIX), lit(""), false)
        .alias(name)
}

/// Rewrite `column` in place with its normalized quote identifier.
pub fn normalize_local_keys(df: &DataFrame, table: &str, column: &str) -> Result<DataFrame> {
    require_columns(df, table, &[column])?;
    let out = df
        .clone()
        .lazy()
        .with_column(normalized_key(column))
        .collect()?;
    debug!("{table}: normalized identifiers in `{column}`");
    Ok(out)
}

/// Drop a trailing `.0` from identifier columns read back from floats.
pub fn strip_float_artefacts<S: AsRef<str>>(df: &DataFrame, table: &str, columns: &[S]) -> Result<DataFrame> {
    require_columns(df, table, columns)?;
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| {
            let c = c.as_ref();
            col(c)
                .cast(DataType::String)
                .str()
                .replace_all(lit(FLOAT_ARTEFACT), lit(""), false)
                .alias(c)
        })
        .collect();
    Ok(df.clone().lazy().with_columns(exprs).collect()?)
}
