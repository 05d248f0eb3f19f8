/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

//! Replace a local key (quote identifier) with a canonical key (organization
//! identifier).
//!
//! Local keys that map to a single canonical key are joined directly. Local
//! keys that map to several are fanned out over every candidate and only the
//! candidates whose validity window contains the record date survive. The
//! union is then collapsed to one row per (canonical key, record date).

use log::{debug, info, warn};
use polars::prelude::*;
use serde::Serialize;

use crate::cleaner::{RecordCleaner, TieBreak};
use crate::error::{DataError, Result};
use crate::schema::{column_names, forbid_column, require_columns};
use crate::windows::{WindowColumns, collapse_windows, window_contains};

const MULTIPLICITY: &str = "__multiplicity";
const MATCHED: &str = "__matched";
const ROW: &str = "__row";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileColumns {
    pub local_key: String,
    pub canonical_key: String,
    pub record_date: String,
    pub first_valid: String,
    pub last_valid: String,
}

impl Default for ReconcileColumns {
    fn default() -> Self {
        ReconcileColumns {
            local_key: "RIC".into(),
            canonical_key: "OrganizationID".into(),
            record_date: "PeriodEndDate".into(),
            first_valid: "firstdt".into(),
            last_valid: "lastdt".into(),
        }
    }
}

impl ReconcileColumns {
    fn windows(&self) -> WindowColumns {
        WindowColumns::new(
            self.canonical_key.as_str(),
            self.first_valid.as_str(),
            self.last_valid.as_str(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub records_in: usize,
    pub precise_keys: usize,
    pub ambiguous_keys: usize,
    pub precise_rows: usize,
    /// Rows after fanning ambiguous records out over their candidates.
    pub ambiguous_candidates: usize,
    pub ambiguous_rows: usize,
    /// Records whose date fell inside more than one candidate window.
    pub ambiguous_survivors: usize,
    /// Records without a local key; neither resolved nor unmatched.
    pub null_local_keys: usize,
    pub incomplete_dropped: usize,
    pub duplicates_collapsed: usize,
    pub resolved_rows: usize,
    pub unmatched_keys: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Canonical key first, then the record columns minus the local key.
    pub resolved: DataFrame,
    /// Distinct local keys with no entry in the relation, sorted.
    pub unmatched: DataFrame,
    pub stats: ReconcileStats,
}

#[derive(Debug, Clone)]
pub struct KeyReconciler {
    columns: ReconcileColumns,
    buffer_days: u32,
    mandatory: Vec<String>,
    variables: Option<Vec<String>>,
    tie_breaks: Vec<TieBreak>,
}

impl Default for KeyReconciler {
    fn default() -> Self {
        KeyReconciler::new(ReconcileColumns::default())
    }
}

impl KeyReconciler {
    pub fn new(columns: ReconcileColumns) -> Self {
        KeyReconciler {
            columns,
            buffer_days: 0,
            mandatory: Vec::new(),
            variables: None,
            tie_breaks: Vec::new(),
        }
    }

    /// Days the lower window bound is pulled back by.
    pub fn with_buffer_days(mut self, days: u32) -> Self {
        self.buffer_days = days;
        self
    }

    /// Columns that must be non-null in a resolved row, besides the canonical
    /// key and the record date.
    pub fn with_mandatory<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Payload columns ranked by the final keyed collapse. Defaults to every
    /// resolved column except the canonical key and the record date.
    pub fn with_variables<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tie_breaks(mut self, tie_breaks: Vec<TieBreak>) -> Self {
        self.tie_breaks = tie_breaks;
        self
    }

    pub fn columns(&self) -> &ReconcileColumns {
        &self.columns
    }

    fn validate(&self, records: &DataFrame, relation: &DataFrame, windows: &DataFrame) -> Result<()> {
        let c = &self.columns;
        let mut required = vec![c.local_key.as_str(), c.record_date.as_str()];
        required.extend(self.mandatory.iter().map(String::as_str));
        require_columns(records, "records", &required)?;
        require_columns(relation, "relation", &[c.local_key.as_str(), c.canonical_key.as_str()])?;
        require_columns(
            windows,
            "windows",
            &[c.canonical_key.as_str(), c.first_valid.as_str(), c.last_valid.as_str()],
        )?;

        for name in [
            c.canonical_key.as_str(),
            c.first_valid.as_str(),
            c.last_valid.as_str(),
            MULTIPLICITY,
            MATCHED,
            ROW,
        ] {
            forbid_column(records, "records", name)?;
        }
        Ok(())
    }

    /// Distinct, complete (local, canonical) pairs.
    fn links(&self, relation: &DataFrame) -> Result<DataFrame> {
        let local = self.columns.local_key.as_str();
        let canonical = self.columns.canonical_key.as_str();
        let pairs = relation
            .clone()
            .lazy()
            .select([col(local), col(canonical)])
            .filter(col(local).is_not_null().and(col(canonical).is_not_null()))
            .collect()?;
        Ok(pairs.unique_stable(None, UniqueKeepStrategy::First, None)?)
    }

    pub fn reconcile(
        &self,
        records: &DataFrame,
        relation: &DataFrame,
        windows: &DataFrame,
    ) -> Result<Reconciliation> {
        self.validate(records, relation, windows)?;

        let c = &self.columns;
        let local = c.local_key.as_str();
        let canonical = c.canonical_key.as_str();
        let date = c.record_date.as_str();

        let buffer_days = i32::try_from(self.buffer_days).map_err(|_| {
            DataError::InvalidArgument(format!("buffer of {} days is out of range", self.buffer_days))
        })?;

        let links = self.links(relation)?;
        if links.height() == 0 {
            return Err(DataError::EmptyRelation {
                table: "relation".into(),
            });
        }

        let mut stats = ReconcileStats {
            records_in: records.height(),
            null_local_keys: records.column(local)?.null_count(),
            ..Default::default()
        };
        if stats.null_local_keys > 0 {
            warn!("{} record(s) have no `{local}` and are skipped", stats.null_local_keys);
        }

        let counts = links
            .clone()
            .lazy()
            .group_by([col(local)])
            .agg([col(canonical).n_unique().alias(MULTIPLICITY)])
            .collect()?;
        let weighted = links
            .clone()
            .lazy()
            .inner_join(counts.clone().lazy(), col(local), col(local));

        let precise_links = weighted
            .clone()
            .filter(col(MULTIPLICITY).eq(lit(1)))
            .select([col(local), col(canonical)]);
        let ambiguous_links = weighted
            .filter(col(MULTIPLICITY).gt(lit(1)))
            .select([col(local), col(canonical)]);

        stats.precise_keys = counts
            .clone()
            .lazy()
            .filter(col(MULTIPLICITY).eq(lit(1)))
            .collect()?
            .height();
        stats.ambiguous_keys = counts.height() - stats.precise_keys;

        // canonical key first, local key dropped
        let output: Vec<Expr> = std::iter::once(canonical.to_string())
            .chain(column_names(records).into_iter().filter(|n| n != local))
            .map(|n| col(n.as_str()))
            .collect();

        let numbered = records.clone().lazy().with_row_index(ROW, None);

        let precise = numbered
            .clone()
            .inner_join(precise_links, col(local), col(local))
            .select(output.clone())
            .collect()?;
        stats.precise_rows = precise.height();

        let fanned = numbered
            .inner_join(ambiguous_links, col(local), col(local))
            .left_join(collapse_windows(windows, &c.windows()), col(canonical), col(canonical))
            .collect()?;
        stats.ambiguous_candidates = fanned.height();

        let within = fanned
            .lazy()
            .filter(window_contains(
                date,
                c.first_valid.as_str(),
                c.last_valid.as_str(),
                buffer_days,
            ))
            .collect()?;
        stats.ambiguous_rows = within.height();

        let survivors = within
            .clone()
            .lazy()
            .group_by([col(ROW), col(local), col(date)])
            .agg([col(canonical).alias("candidates"), len().alias("n")])
            .filter(col("n").gt(lit(1)))
            .collect()?;
        stats.ambiguous_survivors = survivors.height();
        if stats.ambiguous_survivors > 0 {
            warn!(
                "{} ambiguous record(s) fall inside more than one validity window; all candidates kept",
                stats.ambiguous_survivors
            );
            debug!("overlapping candidates:\n{survivors}");
        }

        let ambiguous = within.lazy().select(output).collect()?;

        let mut keep = col(canonical).is_not_null().and(col(date).is_not_null());
        for m in &self.mandatory {
            keep = keep.and(col(m.as_str()).is_not_null());
        }
        let combined = concat(
            [precise.lazy(), ambiguous.lazy()],
            UnionArgs::default(),
        )?
        .collect()?;
        let complete = combined.clone().lazy().filter(keep).collect()?;
        stats.incomplete_dropped = combined.height() - complete.height();

        let variables = match &self.variables {
            Some(v) => v.clone(),
            None => column_names(&complete)
                .into_iter()
                .filter(|n| n != canonical && n != date)
                .collect(),
        };
        let (resolved, report) = RecordCleaner::new([canonical, date], variables)
            .with_tie_breaks(self.tie_breaks.clone())
            .with_table_name("resolved")
            .clean_keyed_with_report(&complete)?;
        stats.duplicates_collapsed = report.rows_in - report.rows_out;
        stats.resolved_rows = resolved.height();

        let unmatched = self.unmatched(records, &counts)?;
        stats.unmatched_keys = unmatched.height();

        info!(
            "reconciled {} record(s): {} precise / {} ambiguous key(s), {} precise row(s), {} of {} ambiguous candidate(s) inside window (buffer {}d), {} resolved, {} unmatched key(s)",
            stats.records_in,
            stats.precise_keys,
            stats.ambiguous_keys,
            stats.precise_rows,
            stats.ambiguous_rows,
            stats.ambiguous_candidates,
            self.buffer_days,
            stats.resolved_rows,
            stats.unmatched_keys
        );

        Ok(Reconciliation {
            resolved,
            unmatched,
            stats,
        })
    }

    /// Distinct non-null local keys of `records` with no row in `counts`.
    fn unmatched(&self, records: &DataFrame, counts: &DataFrame) -> Result<DataFrame> {
        let local = self.columns.local_key.as_str();
        let known = counts
            .clone()
            .lazy()
            .select([col(local), lit(true).alias(MATCHED)]);
        let keys = records
            .clone()
            .lazy()
            .select([col(local)])
            .filter(col(local).is_not_null())
            .collect()?
            .unique_stable(None, UniqueKeepStrategy::First, None)?;

        let out = keys
            .lazy()
            .left_join(known, col(local), col(local))
            .filter(col(MATCHED).is_null())
            .select([col(local)])
            .sort([local], Default::default())
            .collect()?;
        if out.height() > 0 {
            debug!("{} local key(s) missing from relation", out.height());
        }
        Ok(out)
    }
}
