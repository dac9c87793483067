use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::constants::EXPORT_FILE_PREFIX;
use crate::error::Result;
use crate::pipeline::processing::enrich::ExportFilters;

/// Directory of generated CSV exports
#[derive(Debug, Clone)]
pub struct ExportStore {
    dir: PathBuf,
}

impl ExportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `content` under `filename`, creating the directory if needed
    pub fn save(&self, filename: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, content)?;
        info!("Wrote export {}", path.display());
        Ok(path)
    }

    /// Resolve a previously written export. Names that could escape the
    /// directory resolve to nothing.
    pub fn locate(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_filename(filename) {
            return None;
        }
        let path = self.dir.join(filename);
        path.is_file().then_some(path)
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
}

/// `partner_export[_city][_rep]_YYYYMMDD_HHMMSS.csv`. Filter values are
/// lowercased and every character outside `[a-z0-9_-]` becomes `_`.
pub fn export_filename(filters: &ExportFilters, now: DateTime<Local>) -> String {
    let mut parts = vec![EXPORT_FILE_PREFIX.to_string()];
    for filter in [&filters.city, &filters.sales_rep].into_iter().flatten() {
        parts.push(filename_part(filter));
    }
    parts.push(now.format("%Y%m%d_%H%M%S").to_string());
    format!("{}.csv", parts.join("_"))
}

fn filename_part(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}
