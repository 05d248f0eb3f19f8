/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use log::info;
use polars::prelude::*;

use crate::error::{DataError, Result};
use crate::schema::require_columns;

/// Merge several link tables into one distinct (local, canonical) relation.
///
/// Key columns are read as text, so an identifier stored as an integer in one
/// source still matches the same identifier stored as a string in another.
/// Rows with either key missing are dropped; output is sorted by both keys.
pub fn collate_relations(sources: &[DataFrame], local: &str, canonical: &str) -> Result<DataFrame> {
    if sources.is_empty() {
        return Err(DataError::InvalidArgument(
            "at least one relation source is required".into(),
        ));
    }

    let mut frames = Vec::with_capacity(sources.len());
    for (i, src) in sources.iter().enumerate() {
        require_columns(src, &format!("relation source #{}", i + 1), &[local, canonical])?;
        frames.push(src.clone().lazy().select([
            col(local).cast(DataType::String),
            col(canonical).cast(DataType::String),
        ]));
    }

    let rows_in: usize = sources.iter().map(DataFrame::height).sum();
    let out = concat(frames, UnionArgs::default())?
        .filter(col(local).is_not_null().and(col(canonical).is_not_null()))
        .sort([local, canonical], Default::default())
        .collect()?
        .unique_stable(None, UniqueKeepStrategy::First, None)?;

    info!(
        "collated {} relation source(s): {} -> {} distinct link(s)",
        sources.len(),
        rows_in,
        out.height()
    );
    Ok(out)
}

/// Distinct canonical keys per local key, largest first.
pub fn multiplicity(relation: &DataFrame, local: &str, canonical: &str) -> Result<DataFrame> {
    require_columns(relation, "relation", &[local, canonical])?;
    let out = relation
        .clone()
        .lazy()
        .filter(col(local).is_not_null().and(col(canonical).is_not_null()))
        .group_by([col(local)])
        .agg([col(canonical).n_unique().alias("multiplicity")])
        .sort_by_exprs(
            [col("multiplicity"), col(local)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;
    Ok(out)
}
