/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use log::info;
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::cleaner::{CleanReport, RecordCleaner, TieBreak};
use crate::error::Result;
use crate::identifiers::{normalize_local_keys, strip_float_artefacts};
use crate::reconciler::{KeyReconciler, ReconcileStats};
use crate::schema::column_names;

/// Row counts per stage of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub raw_rows: usize,
    pub pre_clean: CleanReport,
    pub reconcile: ReconcileStats,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub resolved: DataFrame,
    pub unmatched: DataFrame,
    pub summary: PipelineSummary,
}

/// raw records → keyed clean on (local key, date) → reconcile → keyed clean
/// on (canonical key, date).
#[derive(Debug, Clone)]
pub struct AnnouncementPipeline {
    reconciler: KeyReconciler,
    variables: Option<Vec<String>>,
    tie_breaks: Vec<TieBreak>,
    normalize_keys: bool,
}

impl AnnouncementPipeline {
    pub fn new(reconciler: KeyReconciler) -> Self {
        AnnouncementPipeline {
            reconciler,
            variables: None,
            tie_breaks: Vec::new(),
            normalize_keys: false,
        }
    }

    /// Payload columns of the raw records, ranked by both keyed collapses.
    /// Defaults to every column other than the local key and the record date.
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_tie_breaks(mut self, tie_breaks: Vec<TieBreak>) -> Self {
        self.tie_breaks = tie_breaks;
        self
    }

    /// Strip delisting suffixes and IPO prefixes from local keys, and float
    /// artefacts from canonical keys, before anything else.
    pub fn with_key_normalization(mut self, on: bool) -> Self {
        self.normalize_keys = on;
        self
    }

    pub fn run(&self, records: &DataFrame, relation: &DataFrame, windows: &DataFrame) -> Result<PipelineOutput> {
        let c = self.reconciler.columns();
        let local = c.local_key.as_str();
        let canonical = c.canonical_key.as_str();
        let date = c.record_date.as_str();

        let (records, relation, windows) = if self.normalize_keys {
            let relation = normalize_local_keys(relation, "relation", local)?;
            (
                normalize_local_keys(records, "records", local)?,
                strip_float_artefacts(&relation, "relation", &[canonical])?,
                strip_float_artefacts(windows, "windows", &[canonical])?,
            )
        } else {
            (records.clone(), relation.clone(), windows.clone())
        };

        let variables = match &self.variables {
            Some(v) => v.clone(),
            None => column_names(&records)
                .into_iter()
                .filter(|n| n != local && n != date)
                .collect(),
        };
        let (collapsed, pre_clean) = RecordCleaner::new([local, date], variables)
            .with_tie_breaks(self.tie_breaks.clone())
            .with_table_name("records")
            .clean_keyed_with_report(&records)?;

        let reconciler = match &self.variables {
            Some(v) => self.reconciler.clone().with_variables(v.iter().cloned()),
            None => self.reconciler.clone(),
        };
        let rec = reconciler.reconcile(&collapsed, &relation, &windows)?;

        let summary = PipelineSummary {
            raw_rows: records.height(),
            pre_clean,
            reconcile: rec.stats,
        };
        info!(
            "pipeline: {} raw -> {} per quote/date -> {} resolved, {} unmatched key(s)",
            summary.raw_rows,
            summary.pre_clean.rows_out,
            summary.reconcile.resolved_rows,
            summary.reconcile.unmatched_keys
        );

        Ok(PipelineOutput {
            resolved: rec.resolved,
            unmatched: rec.unmatched,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::*;

    use crate::reconciler::ReconcileColumns;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn normalizes_collapses_and_reconciles() {
        let records = df![
            "RIC" => [Some("ABC.ST^L12"), Some("ABC.ST"), Some("IPO-NEW.ST"), None],
            "PeriodEndDate" => [d(2019, 3, 31), d(2019, 3, 31), d(2019, 6, 30), d(2019, 6, 30)],
            "AnnDate" => [Some(d(2019, 4, 25)), None, Some(d(2019, 8, 1)), Some(d(2019, 8, 2))],
        ]
        .unwrap();
        let relation = df![
            "RIC" => ["ABC.ST", "NEW.ST"],
            "OrganizationID" => ["100.0", "200.0"],
        ]
        .unwrap();
        let windows = df![
            "OrganizationID" => ["100", "200"],
            "firstdt" => [d(2000, 1, 1), d(2000, 1, 1)],
            "lastdt" => [d(2030, 1, 1), d(2030, 1, 1)],
        ]
        .unwrap();

        let out = AnnouncementPipeline::new(
            KeyReconciler::new(ReconcileColumns::default()).with_buffer_days(93),
        )
        .with_key_normalization(true)
        .run(&records, &relation, &windows)
        .unwrap();

        assert_eq!(out.summary.raw_rows, 4);
        assert_eq!(out.summary.pre_clean.rows_out, 2);
        assert_eq!(out.resolved.height(), 2);
        assert_eq!(out.unmatched.height(), 0);
        let orgs: Vec<Option<&str>> = out
            .resolved
            .column("OrganizationID")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(orgs, vec![Some("100"), Some("200")]);
    }

    #[test]
    fn chosen_variables_reach_final_collapse() {
        // two quotes of one organization, same period
        let records = df![
            "RIC" => ["X.ST", "X2.ST"],
            "PeriodEndDate" => [d(2019, 3, 31), d(2019, 3, 31)],
            "AnnDate" => [d(2019, 4, 1), d(2019, 4, 20)],
            "Note" => [None, Some("restated")],
        ]
        .unwrap();
        let relation = df![
            "RIC" => ["X.ST", "X2.ST"],
            "OrganizationID" => ["A", "A"],
        ]
        .unwrap();
        let windows = df![
            "OrganizationID" => ["A"],
            "firstdt" => [d(2000, 1, 1)],
            "lastdt" => [d(2030, 1, 1)],
        ]
        .unwrap();

        let out = AnnouncementPipeline::new(KeyReconciler::default())
            .with_variables(vec!["AnnDate".to_string()])
            .run(&records, &relation, &windows)
            .unwrap();
        let ann: Vec<Option<String>> = out
            .resolved
            .column("AnnDate")
            .unwrap()
            .cast(&DataType::String)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        assert_eq!(ann, vec![Some("2019-04-01".to_string())]);
    }
}
