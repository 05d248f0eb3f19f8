/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use std::fs;
use std::path::Path;

use log::{debug, info};
use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::error::{DataError, Result};
use crate::manifest::OutputManifest;

pub mod csv;
pub mod parquet;

pub use self::csv::CsvTable;
pub use self::parquet::ParquetTable;

/// Reads and encodes one on-disk table format.
pub trait TableCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn read(&self, path: &Path) -> Result<DataFrame>;

    /// Encode `df` into `out`. The caller owns file placement.
    fn encode(&self, df: &mut DataFrame, out: &mut fs::File) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// `.csv`/`.tsv`/`.txt` are tab separated text, anything mentioning
    /// parquet (`.parquet`, `.pq`) is Parquet.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(TableFormat::Csv),
            "pq" => Ok(TableFormat::Parquet),
            e if e.contains("parquet") => Ok(TableFormat::Parquet),
            _ => Err(DataError::InvalidArgument(format!(
                "cannot tell table format of `{}` from its extension",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Brotli,
    #[default]
    Zstd,
}

impl Compression {
    pub fn parquet(self) -> ParquetCompression {
        match self {
            Compression::Uncompressed => ParquetCompression::Uncompressed,
            Compression::Snappy => ParquetCompression::Snappy,
            Compression::Gzip => ParquetCompression::Gzip(None),
            Compression::Brotli => ParquetCompression::Brotli(None),
            Compression::Zstd => ParquetCompression::Zstd(None),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Overrides the extension-based choice.
    pub format: Option<TableFormat>,
    pub compression: Compression,
}

fn codec(format: TableFormat, compression: Compression) -> Box<dyn TableCodec> {
    match format {
        TableFormat::Csv => Box::new(CsvTable::default()),
        TableFormat::Parquet => Box::new(ParquetTable::new(compression)),
    }
}

pub fn read_table(path: &Path, format: Option<TableFormat>) -> Result<DataFrame> {
    let format = match format {
        Some(f) => f,
        None => TableFormat::from_path(path)?,
    };
    let codec = codec(format, Compression::default());
    let df = codec.read(path)?;
    debug!(
        "read {} row(s) x {} column(s) from {} ({})",
        df.height(),
        df.width(),
        path.display(),
        codec.name()
    );
    Ok(df)
}

/// Replace the whole content of `path` with `df`.
///
/// The table is encoded into a temporary file next to `path` and renamed over
/// it, so readers never observe a half-written file.
pub fn write_table(df: &DataFrame, path: &Path, options: &WriteOptions) -> Result<()> {
    let format = match options.format {
        Some(f) => f,
        None => TableFormat::from_path(path)?,
    };
    let codec = codec(format, options.compression);
    let mut df = df.clone();
    replace_file(path, |out| codec.encode(&mut df, out))?;

    info!(
        "wrote {} row(s) to {} ({})",
        df.height(),
        path.display(),
        codec.name()
    );
    Ok(())
}

/// Write a sibling temporary file with `write` and rename it over `path`.
/// On error the temporary file is removed and `path` is untouched.
pub(crate) fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `write_table` followed by the manifest sidecar.
pub fn publish(df: &DataFrame, path: &Path, options: &WriteOptions) -> Result<OutputManifest> {
    write_table(df, path, options)?;
    let manifest = OutputManifest::describe(df, path)?;
    manifest.write_sidecar()?;
    Ok(manifest)
}

/// Parse the text columns among `columns` as `%Y-%m-%d` dates. Longer
/// timestamps are truncated to their date; unparseable values become null.
/// Columns that are already typed are left alone.
pub fn parse_dates<S: AsRef<str>>(df: &DataFrame, table: &str, columns: &[S]) -> Result<DataFrame> {
    crate::schema::require_columns(df, table, columns)?;
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| matches!(df.column(c).map(|s| s.dtype()), Ok(DataType::String)))
        .map(|c| {
            col(c)
                .str()
                .to_date(StrptimeOptions {
                    format: Some("%Y-%m-%d".into()),
                    strict: false,
                    exact: false,
                    ..Default::default()
                })
                .alias(c)
        })
        .collect();
    if exprs.is_empty() {
        return Ok(df.clone());
    }
    Ok(df.clone().lazy().with_columns(exprs).collect()?)
}
