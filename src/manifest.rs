/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::io::replace_file;
use crate::schema::column_names;

/// Sidecar describing one written output file.
///
/// Two runs over the same inputs should produce manifests with equal
/// `sha256`; `written_at` is the only field expected to differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
    pub sha256: String,
    pub written_at: DateTime<Utc>,
}

impl OutputManifest {
    pub fn describe(df: &DataFrame, path: &Path) -> Result<Self> {
        Ok(OutputManifest {
            path: path.to_path_buf(),
            rows: df.height(),
            columns: column_names(df),
            sha256: file_sha256(path)?,
            written_at: Utc::now(),
        })
    }

    /// `out.parquet` -> `out.parquet.manifest.json`
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".manifest.json");
        PathBuf::from(name)
    }

    pub fn write_sidecar(&self) -> Result<PathBuf> {
        let sidecar = Self::sidecar_path(&self.path);
        let body = serde_json::to_string_pretty(self)?;
        replace_file(&sidecar, |out| Ok(out.write_all(body.as_bytes())?))?;
        debug!("manifest written to {}", sidecar.display());
        Ok(sidecar)
    }

    pub fn load(sidecar: &Path) -> Result<Self> {
        let body = fs::read_to_string(sidecar)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// True when the file on disk still hashes to the recorded digest.
    pub fn verify(&self) -> Result<bool> {
        Ok(file_sha256(&self.path)? == self.sha256)
    }
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut h = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(hex::encode(h.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn sidecar_round_trips_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "RIC\nABC.ST\n").unwrap();
        let df = df!["RIC" => ["ABC.ST"]].unwrap();

        let m = OutputManifest::describe(&df, &path).unwrap();
        assert_eq!(m.rows, 1);
        assert_eq!(m.columns, vec!["RIC".to_string()]);
        assert_eq!(m.sha256.len(), 64);

        let sidecar = m.write_sidecar().unwrap();
        assert_eq!(sidecar, dir.path().join("out.csv.manifest.json"));
        let loaded = OutputManifest::load(&sidecar).unwrap();
        assert_eq!(loaded, m);
        assert!(loaded.verify().unwrap());

        fs::write(&path, "RIC\nDEF.ST\n").unwrap();
        assert!(!loaded.verify().unwrap());
    }

    #[test]
    fn known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
