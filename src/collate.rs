/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

//! Stitch per-year vendor exports (`{prefix}_{freq}_{year}.csv`) into one
//! cleaned table.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use polars::prelude::*;

use crate::cleaner::RecordCleaner;
use crate::error::{DataError, Result};
use crate::io::{CsvTable, TableCodec, parse_dates};
use crate::schema::forbid_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ReportFrequency {
    /// quarterly
    Fq,
    /// semi-annual
    Fs,
    /// annual
    Fy,
}

impl ReportFrequency {
    pub fn code(self) -> &'static str {
        match self {
            ReportFrequency::Fq => "fq",
            ReportFrequency::Fs => "fs",
            ReportFrequency::Fy => "fy",
        }
    }

    /// Letter stored in the tag column.
    pub fn tag(self) -> &'static str {
        match self {
            ReportFrequency::Fq => "Q",
            ReportFrequency::Fs => "S",
            ReportFrequency::Fy => "Y",
        }
    }

    pub fn file_name(self, prefix: &str, year: i32) -> String {
        format!("{prefix}_{}_{year}.csv", self.code())
    }
}

impl fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct CollateJob {
    pub source_dir: PathBuf,
    pub prefix: String,
    pub frequencies: Vec<ReportFrequency>,
    pub years: Vec<i32>,
    pub cleaner: RecordCleaner,
    pub date_columns: Vec<String>,
    /// Column receiving the frequency letter; `None` adds no column.
    pub tag_column: Option<String>,
}

impl CollateJob {
    pub fn new(source_dir: impl Into<PathBuf>, prefix: impl Into<String>, cleaner: RecordCleaner) -> Self {
        CollateJob {
            source_dir: source_dir.into(),
            prefix: prefix.into(),
            frequencies: vec![ReportFrequency::Fq, ReportFrequency::Fs],
            years: Vec::new(),
            cleaner,
            date_columns: Vec::new(),
            tag_column: Some("rp".to_string()),
        }
    }

    pub fn paths(&self) -> Vec<(ReportFrequency, i32, PathBuf)> {
        let mut out = Vec::with_capacity(self.frequencies.len() * self.years.len());
        for &freq in &self.frequencies {
            for &year in &self.years {
                out.push((freq, year, self.source_dir.join(freq.file_name(&self.prefix, year))));
            }
        }
        out
    }

    fn load(&self, freq: ReportFrequency, path: &Path) -> Result<DataFrame> {
        let table = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let raw = CsvTable::default().read(path)?;
        let mut df = parse_dates(&raw, &table, &self.date_columns)?;
        if let Some(tag) = &self.tag_column {
            forbid_column(&df, &table, tag)?;
            df = df
                .lazy()
                .with_column(lit(freq.tag()).alias(tag.as_str()))
                .collect()?;
        }
        self.cleaner.clone().with_table_name(table).clean(&df)
    }

    /// Read, tag and clean every existing file, then clean the union once more.
    pub fn run(&self) -> Result<DataFrame> {
        let mut frames = Vec::new();
        for (freq, year, path) in self.paths() {
            if !path.exists() {
                warn!("{}: no {freq} export for {year}, skipping", path.display());
                continue;
            }
            let df = self.load(freq, &path)?;
            debug!("{}: {} row(s) after cleaning", path.display(), df.height());
            frames.push(df.lazy());
        }

        if frames.is_empty() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no `{}_*` export found in {}",
                    self.prefix,
                    self.source_dir.display()
                ),
            )));
        }

        let files = frames.len();
        let stacked = concat_lf_diagonal(frames, UnionArgs::default())?.collect()?;
        let out = self
            .cleaner
            .clone()
            .with_table_name(self.prefix.as_str())
            .clean(&stacked)?;
        info!(
            "{}: collated {} file(s) into {} row(s)",
            self.prefix,
            files,
            out.height()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

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

    fn job(dir: &Path) -> CollateJob {
        let mut job = CollateJob::new(
            dir,
            "anndats",
            RecordCleaner::new(["RIC", "PeriodEndDate"], ["AnnDate"]),
        );
        job.years = vec![2019, 2020];
        job.date_columns = vec!["PeriodEndDate".into(), "AnnDate".into()];
        job
    }

    #[test]
    fn file_names_and_tags() {
        assert_eq!(ReportFrequency::Fq.file_name("anndats", 2001), "anndats_fq_2001.csv");
        assert_eq!(ReportFrequency::Fs.tag(), "S");
        assert_eq!(ReportFrequency::Fy.to_string(), "fy");
    }

    #[test]
    fn collates_existing_files_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("anndats_fq_2019.csv"),
            "RIC\tPeriodEndDate\tAnnDate\n\
             ABC.ST\t2019-03-31\t2019-04-25\n\
             ABC.ST\t2019-03-31\t2019-04-25\n\
             DEF.ST\t \t2019-04-20\n\
             GHI.ST\t2019-03-31\t \n",
        )
        .unwrap();
        fs::write(
            dir.path().join("anndats_fs_2020.csv"),
            "RIC\tPeriodEndDate\tAnnDate\n\
             ABC.ST\t2020-06-30\t2020-08-14 00:00:00\n",
        )
        .unwrap();

        let out = job(dir.path()).run().unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            texts(&out, "PeriodEndDate"),
            vec![Some("2019-03-31".into()), Some("2020-06-30".into())]
        );
        assert_eq!(texts(&out, "rp"), vec![Some("Q".into()), Some("S".into())]);
        assert_eq!(
            texts(&out, "AnnDate"),
            vec![Some("2019-04-25".into()), Some("2020-08-14".into())]
        );
    }

    #[test]
    fn no_files_at_all_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match job(dir.path()).run() {
            Err(DataError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
