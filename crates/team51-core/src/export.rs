//! File exports for reporting commands.

use std::path::{Path, PathBuf};

use crate::output::Table;
use crate::{Error, Result};

/// File format for `--export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown export format '{}', expected csv or json",
                other
            ))),
        }
    }
}

/// Write `table` to `<dir>/<stem>.<ext>` and return the path written.
pub fn export_table(table: &Table, format: ExportFormat, dir: &Path, stem: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", stem, format.extension()));

    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(&path)
                .map_err(|e| Error::Internal(format!("failed to open {}: {}", path.display(), e)))?;
            writer
                .write_record(table.headers())
                .and_then(|_| {
                    table
                        .rows()
                        .iter()
                        .try_for_each(|row| writer.write_record(row))
                })
                .map_err(|e| Error::Internal(format!("failed to write CSV: {}", e)))?;
            writer.flush()?;
        }
        ExportFormat::Json => {
            let json = serde_json::to_string_pretty(&table.to_json())
                .map_err(|e| Error::Internal(format!("failed to encode JSON: {}", e)))?;
            std::fs::write(&path, json)?;
        }
    }

    Ok(path)
}
