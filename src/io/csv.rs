/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use super::TableCodec;
use crate::error::Result;

/// Delimited text. Every column is read as text; the vendor exports mark a
/// missing cell with a single blank.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub separator: u8,
    pub null_value: String,
}

impl Default for CsvTable {
    fn default() -> Self {
        CsvTable {
            separator: b'\t',
            null_value: " ".to_string(),
        }
    }
}

impl TableCodec for CsvTable {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn read(&self, path: &Path) -> Result<DataFrame> {
        let separator = self.separator;
        let nulls = NullValues::AllColumnsSingle(self.null_value.as_str().into());
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .map_parse_options(move |p| {
                p.with_separator(separator)
                    .with_null_values(Some(nulls.clone()))
            })
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    fn encode(&self, df: &mut DataFrame, out: &mut File) -> Result<()> {
        CsvWriter::new(out)
            .include_header(true)
            .with_separator(self.separator)
            .with_null_value(self.null_value.clone())
            .finish(df)?;
        Ok(())
    }
}
