//! CSV export of cached results

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::domain::{QueryResult, Value};

/// Writes results to timestamped CSV files in one directory
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `result` to `export_<unix-seconds>.csv` and return the path
    pub fn export(&self, result: &QueryResult) -> Result<PathBuf> {
        self.export_at(result, chrono::Utc::now().timestamp())
    }

    pub(crate) fn export_at(&self, result: &QueryResult, unix_seconds: i64) -> Result<PathBuf> {
        debug!(dir = %self.dir.display(), rows = result.row_count(), "CsvExporter::export_at: called");
        std::fs::create_dir_all(&self.dir)
            .context(format!("Failed to create export directory {}", self.dir.display()))?;

        let path = self.dir.join(format!("export_{}.csv", unix_seconds));
        let mut writer =
            csv::Writer::from_path(&path).context(format!("Failed to create {}", path.display()))?;

        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(row.iter().map(csv_field))?;
        }
        writer.flush()?;

        info!(path = %path.display(), rows = result.row_count(), "result exported");
        Ok(path)
    }
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Real(r) if r.fract() == 0.0 && r.is_finite() => format!("{:.1}", r),
        other => other.to_string(),
    }
}
