/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use super::{Compression, TableCodec};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct ParquetTable {
    compression: Compression,
}

impl ParquetTable {
    pub fn new(compression: Compression) -> Self {
        ParquetTable { compression }
    }
}

impl TableCodec for ParquetTable {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn read(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        Ok(ParquetReader::new(file).finish()?)
    }

    fn encode(&self, df: &mut DataFrame, out: &mut File) -> Result<()> {
        ParquetWriter::new(out)
            .with_compression(self.compression.parquet())
            .finish(df)?;
        Ok(())
    }
}
