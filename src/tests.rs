/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/
#[cfg(test)]
pub mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::NaiveDate;
    use polars::prelude::*;

    use crate::cleaner::{RecordCleaner, TieBreak};
    use crate::io::{WriteOptions, parse_dates, publish, read_table};
    use crate::manifest::OutputManifest;
    use crate::pipeline::AnnouncementPipeline;
    use crate::reconciler::{KeyReconciler, ReconcileColumns};
    use crate::relations::collate_relations;
    use crate::windows::{WindowColumns, derive_validity_windows};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn texts(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .cast(&DataType::String)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn messy() -> DataFrame {
        df![
            "RIC" => [Some("B.ST"), Some("A.ST"), None, Some("A.ST"), Some("B.ST"), Some("A.ST"), Some("C.ST")],
            "PeriodEndDate" => [Some(d(2020, 3, 31)), Some(d(2020, 3, 31)), Some(d(2020, 3, 31)), Some(d(2020, 3, 31)), None, Some(d(2020, 6, 30)), Some(d(2020, 6, 30))],
            "AnnDate" => [Some(d(2020, 4, 20)), Some(d(2020, 4, 22)), Some(d(2020, 4, 23)), Some(d(2020, 4, 22)), Some(d(2020, 4, 1)), None, Some(d(2020, 7, 30))],
            "EPS" => [Some(1.0), None, Some(2.0), None, Some(0.1), None, Some(3.5)],
        ]
        .unwrap()
    }

    fn cleaner() -> RecordCleaner {
        RecordCleaner::new(["RIC", "PeriodEndDate"], ["AnnDate", "EPS"])
    }

    #[test]
    fn test_clean_is_idempotent_and_shrinks() {
        let raw = messy();
        let once = cleaner().clean(&raw).unwrap();
        let twice = cleaner().clean(&once).unwrap();

        assert!(once.height() <= raw.height());
        assert!(once.equals_missing(&twice));
        assert_eq!(once.column("RIC").unwrap().null_count(), 0);
        assert_eq!(once.column("PeriodEndDate").unwrap().null_count(), 0);
        // A.ST 2020-03-31 duplicate folded, A.ST 2020-06-30 has no payload
        assert_eq!(
            texts(&once, "RIC"),
            vec![Some("A.ST".into()), Some("B.ST".into()), Some("C.ST".into())]
        );
    }

    #[test]
    fn test_null_payload_row_is_subsumed() {
        let raw = df![
            "local" => ["ABC", "ABC"],
            "date" => ["2020-03-31", "2020-03-31"],
            "val" => [None, Some(5.0)],
        ]
        .unwrap();
        let out = RecordCleaner::new(["local", "date"], ["val"])
            .clean(&raw)
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(texts(&out, "local"), vec![Some("ABC".into())]);
        assert_eq!(texts(&out, "date"), vec![Some("2020-03-31".into())]);
        assert_eq!(out.column("val").unwrap().f64().unwrap().get(0), Some(5.0));
    }

    #[test]
    fn test_keyed_clean_prefers_most_complete_row() {
        let raw = df![
            "K" => ["k", "k"],
            "D" => [d(2020, 3, 31), d(2020, 3, 31)],
            "v1" => [Some(1.0), Some(1.0)],
            "v2" => [Some(2.0), Some(2.0)],
            "v3" => [None, Some(3.0)],
            "v4" => [None, Some(4.0)],
            "v5" => [None::<f64>, None],
        ]
        .unwrap();
        let out = RecordCleaner::new(["K", "D"], ["v1", "v2", "v3", "v4", "v5"])
            .clean_keyed(&raw)
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("v4").unwrap().f64().unwrap().get(0), Some(4.0));
    }

    #[test]
    fn test_precise_relation_one_row_per_record() {
        let records = df![
            "RIC" => ["A.ST", "A.ST", "B.ST", "X.ST", "X.ST"],
            "PeriodEndDate" => [d(2020, 3, 31), d(2020, 6, 30), d(2020, 3, 31), d(2020, 3, 31), d(2020, 6, 30)],
            "AnnDate" => [d(2020, 4, 20), d(2020, 7, 20), d(2020, 4, 21), d(2020, 4, 22), d(2020, 7, 22)],
        ]
        .unwrap();
        let relation = df![
            "RIC" => ["A.ST", "B.ST"],
            "OrganizationID" => ["1", "2"],
        ]
        .unwrap();
        let windows = df![
            "OrganizationID" => ["1", "2"],
            "firstdt" => [d(2021, 1, 1), d(2021, 1, 1)],
            "lastdt" => [d(2021, 12, 31), d(2021, 12, 31)],
        ]
        .unwrap();

        // windows are ignored for one-to-one keys
        let out = KeyReconciler::default()
            .reconcile(&records, &relation, &windows)
            .unwrap();
        assert_eq!(out.resolved.height(), 3);
        assert_eq!(texts(&out.unmatched, "RIC"), vec![Some("X.ST".into())]);
    }

    fn ambiguous_inputs(date: NaiveDate) -> (DataFrame, DataFrame, DataFrame) {
        let records = df![
            "RIC" => ["L.ST"],
            "PeriodEndDate" => [date],
            "AnnDate" => [d(2019, 9, 1)],
        ]
        .unwrap();
        let relation = df![
            "RIC" => ["L.ST", "L.ST"],
            "OrganizationID" => ["A", "B"],
        ]
        .unwrap();
        let windows = df![
            "OrganizationID" => ["A", "B"],
            "firstdt" => [d(2019, 1, 1), d(2020, 1, 1)],
            "lastdt" => [d(2019, 12, 31), d(2020, 12, 31)],
        ]
        .unwrap();
        (records, relation, windows)
    }

    #[test]
    fn test_window_filter_picks_matching_candidate() {
        let (records, relation, windows) = ambiguous_inputs(d(2019, 6, 15));
        let out = AnnouncementPipeline::new(KeyReconciler::default())
            .run(&records, &relation, &windows)
            .unwrap();
        assert_eq!(texts(&out.resolved, "OrganizationID"), vec![Some("A".into())]);
        assert_eq!(out.summary.reconcile.ambiguous_candidates, 2);
        assert_eq!(out.summary.reconcile.ambiguous_rows, 1);
    }

    #[test]
    fn test_buffer_days() {
        let (records, relation, windows) = ambiguous_inputs(d(2018, 12, 27));

        let seven = KeyReconciler::default()
            .with_buffer_days(7)
            .reconcile(&records, &relation, &windows)
            .unwrap();
        assert_eq!(seven.resolved.height(), 1);

        let zero = KeyReconciler::default()
            .with_buffer_days(0)
            .reconcile(&records, &relation, &windows)
            .unwrap();
        assert_eq!(zero.resolved.height(), 0);
        // dropped by the window, not unmatched
        assert_eq!(zero.unmatched.height(), 0);
    }

    fn write_tsv(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    fn run_from_files(dir: &Path, out: &Path) -> OutputManifest {
        let records = parse_dates(
            &read_table(&dir.join("anndats.csv"), None).unwrap(),
            "records",
            &["PeriodEndDate", "AnnDate"],
        )
        .unwrap();
        let observations = parse_dates(
            &read_table(&dir.join("fundamentals.csv"), None).unwrap(),
            "observations",
            &["PeriodEndDate"],
        )
        .unwrap();
        let windows =
            derive_validity_windows(&observations, "PeriodEndDate", &WindowColumns::default())
                .unwrap();
        let relation = collate_relations(
            &[
                read_table(&dir.join("links_a.csv"), None).unwrap(),
                read_table(&dir.join("links_b.csv"), None).unwrap(),
            ],
            "RIC",
            "OrganizationID",
        )
        .unwrap();

        let result = AnnouncementPipeline::new(
            KeyReconciler::new(ReconcileColumns::default())
                .with_buffer_days(93)
                .with_mandatory(["AnnDate"]),
        )
        .with_tie_breaks(vec![TieBreak::date_gap("AnnDate", "PeriodEndDate")])
        .with_key_normalization(true)
        .run(&records, &relation, &windows)
        .unwrap();

        assert_eq!(texts(&result.unmatched, "RIC"), vec![Some("ZZZ.ST".into())]);
        publish(&result.resolved, out, &WriteOptions::default()).unwrap()
    }

    #[test]
    fn test_end_to_end_from_files_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        write_tsv(
            &dir.path().join("anndats.csv"),
            "RIC\tPeriodEndDate\tAnnDate\n\
             ABC.ST^F19\t2018-12-31\t2019-02-10\n\
             ABC.ST\t2018-12-31\t2019-03-01\n\
             ABC.ST\t2021-12-31\t2022-02-11\n\
             NEW.ST\t2021-12-31\t2022-02-20\n\
             NEW.ST\t2021-12-31\t \n\
             ZZZ.ST\t2021-12-31\t2022-02-01\n",
        );
        // ABC.ST was reused by organization 2 after 1 delisted
        write_tsv(
            &dir.path().join("fundamentals.csv"),
            "OrganizationID\tPeriodEndDate\n\
             1\t2010-12-31\n\
             1\t2019-12-31\n\
             2\t2021-03-31\n\
             2\t2022-12-31\n\
             3\t2021-12-31\n",
        );
        write_tsv(&dir.path().join("links_a.csv"), "RIC\tOrganizationID\nABC.ST\t1.0\n");
        write_tsv(
            &dir.path().join("links_b.csv"),
            "RIC\tOrganizationID\tName\nABC.ST\t2\tAbc New\nIPO-NEW.ST\t3\tNew\n",
        );

        let out = dir.path().join("out").join("anndats_org.parquet");
        let first = run_from_files(dir.path(), &out);
        let resolved = read_table(&out, None).unwrap();

        assert_eq!(
            texts(&resolved, "OrganizationID"),
            vec![Some("1".into()), Some("2".into()), Some("3".into())]
        );
        // closest announcement wins the (org, date) collapse
        assert_eq!(
            texts(&resolved, "AnnDate"),
            vec![
                Some("2019-02-10".into()),
                Some("2022-02-11".into()),
                Some("2022-02-20".into())
            ]
        );

        let second = run_from_files(dir.path(), &out);
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.rows, 3);
    }
}
