// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON Lines files.
//!
//! Used for recorded fix tracks fed to the replay source and for the
//! supervisor's persisted alert log. Each record is one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Appends one record and syncs the file.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(record)?;
    writeln!(file, "{json}")?;
    file.sync_all()?;
    Ok(())
}

/// Reads every record in file order.
///
/// Blank lines and lines starting with `#` are skipped. A missing file
/// reads as empty. A line that fails to parse is reported with its line
/// number.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|e| {
            Error::CorruptedData(format!("{}:{}: {e}", path.display(), index + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
