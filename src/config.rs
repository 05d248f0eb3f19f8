/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::arg_parser::{parse_tie_break, parse_years};
use crate::cleaner::TieBreak;
use crate::collate::ReportFrequency;
use crate::error::Result;
use crate::io::{Compression, TableFormat, WriteOptions};

pub const ROOT_ENV: &str = "ANNDATS_ROOT";

/// `<documents>/research/refinitiv`, falling back to the working directory
/// when the platform has no documents folder.
pub fn default_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("research")
        .join("refinitiv")
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory relative paths are resolved against
    #[arg(long, env = "ANNDATS_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Parquet compression codec for outputs
    #[arg(long, value_enum, default_value_t = Compression::Zstd, global = true)]
    pub compression: Compression,

    /// Output format; guessed from the extension when omitted
    #[arg(long, value_enum, global = true)]
    pub format: Option<TableFormat>,

    /// Skip the `<out>.manifest.json` sidecar
    #[arg(long, global = true)]
    pub no_manifest: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_root)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir().join(path)
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            format: self.format,
            compression: self.compression,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drop unusable rows and duplicates from one table
    Clean(CleanArgs),
    /// Merge yearly `{prefix}_{freq}_{year}.csv` exports into one cleaned table
    Collate(CollateArgs),
    /// Derive first/last valid dates per canonical key
    Windows(WindowsArgs),
    /// Merge local/canonical link tables into one relation
    Relations(RelationsArgs),
    /// Attach canonical keys to records
    Reconcile(ReconcileArgs),
    /// Check a written output against its manifest sidecar
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_delimiter = ',', required = true)]
    pub index: Vec<String>,

    #[arg(long = "vars", value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Text columns to parse as `%Y-%m-%d` dates first
    #[arg(long, value_delimiter = ',')]
    pub date_columns: Vec<String>,

    /// Keep one row per index key instead of only dropping literal duplicates
    #[arg(long)]
    pub keyed: bool,

    /// `col`, `col:desc` or `gap:left:right`; repeatable
    #[arg(long = "tie-break", value_parser = parse_tie_break)]
    pub tie_breaks: Vec<TieBreak>,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct CollateArgs {
    #[arg(long)]
    pub prefix: String,

    #[arg(long = "freqs", value_enum, value_delimiter = ',', default_values_t = [ReportFrequency::Fq, ReportFrequency::Fs])]
    pub frequencies: Vec<ReportFrequency>,

    /// e.g. `2000..2022` or `2001,2005..2007`
    #[arg(long)]
    pub years: String,

    #[arg(long)]
    pub source_dir: PathBuf,

    #[arg(long, value_delimiter = ',', required = true)]
    pub index: Vec<String>,

    #[arg(long = "vars", value_delimiter = ',')]
    pub variables: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub date_columns: Vec<String>,

    #[arg(long, default_value = "rp")]
    pub tag_column: String,

    /// Do not add the frequency tag column
    #[arg(long)]
    pub no_tag: bool,

    #[arg(long)]
    pub out: PathBuf,
}

impl CollateArgs {
    pub fn years(&self) -> Result<Vec<i32>> {
        parse_years(&self.years)
    }
}

#[derive(Debug, Args)]
pub struct WindowsArgs {
    #[arg(long)]
    pub observations: PathBuf,

    #[arg(long, default_value = "OrganizationID")]
    pub key: String,

    #[arg(long, default_value = "PeriodEndDate")]
    pub date: String,

    #[arg(long, default_value = "firstdt")]
    pub first_name: String,

    #[arg(long, default_value = "lastdt")]
    pub last_name: String,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct RelationsArgs {
    /// Link table; repeatable
    #[arg(long = "source", required = true)]
    pub sources: Vec<PathBuf>,

    #[arg(long, default_value = "RIC")]
    pub local_key: String,

    #[arg(long, default_value = "OrganizationID")]
    pub canonical_key: String,

    /// Strip delisting suffixes, IPO prefixes and `.0` artefacts
    #[arg(long)]
    pub normalize: bool,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// `<out>.manifest.json` written next to an output
    #[arg(long)]
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[arg(long)]
    pub records: PathBuf,

    #[arg(long)]
    pub relation: PathBuf,

    #[arg(long)]
    pub windows: PathBuf,

    #[arg(long, default_value = "RIC")]
    pub local_key: String,

    #[arg(long, default_value = "OrganizationID")]
    pub canonical_key: String,

    #[arg(long, default_value = "PeriodEndDate")]
    pub date: String,

    #[arg(long, default_value = "firstdt")]
    pub first_valid: String,

    #[arg(long, default_value = "lastdt")]
    pub last_valid: String,

    /// Pull each window's lower bound back by this many days
    #[arg(long, default_value_t = 7)]
    pub buffer_days: u32,

    #[arg(long = "vars", value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Columns that must be non-null in a resolved row
    #[arg(long, value_delimiter = ',')]
    pub mandatory: Vec<String>,

    /// Further record columns to parse as dates
    #[arg(long, value_delimiter = ',')]
    pub date_columns: Vec<String>,

    #[arg(long = "tie-break", value_parser = parse_tie_break)]
    pub tie_breaks: Vec<TieBreak>,

    #[arg(long)]
    pub normalize_keys: bool,

    #[arg(long)]
    pub out: PathBuf,

    /// Defaults to `<out stem>_unmatched.csv` next to `--out`
    #[arg(long)]
    pub unmatched_out: Option<PathBuf>,
}

impl ReconcileArgs {
    pub fn unmatched_path(&self) -> PathBuf {
        match &self.unmatched_out {
            Some(p) => p.clone(),
            None => {
                let stem = self
                    .out
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "reconciled".to_string());
                self.out.with_file_name(format!("{stem}_unmatched.csv"))
            }
        }
    }
}
