use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::app::ports::DataSourceConnector;
use crate::config::{ExportConfig, StatsConfig};
use crate::error::{ExportError, Result};
use crate::infra::export_store::{export_filename, ExportStore};
use crate::pipeline::processing::enrich::{EnrichmentPipeline, ExportFilters};
use crate::pipeline::processing::normalize::DefaultNormalizer;
use crate::pipeline::processing::tabular::TabularWriter;
use crate::types::EnrichedRow;

/// A written export file
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub count: usize,
}

/// Query, enrich and write partner exports
pub struct ExportUseCase {
    connector: Arc<dyn DataSourceConnector>,
    normalizer: DefaultNormalizer,
    export: ExportConfig,
    stats: StatsConfig,
    writer: TabularWriter,
    store: ExportStore,
}

impl ExportUseCase {
    pub fn new(connector: Arc<dyn DataSourceConnector>, export: ExportConfig, stats: StatsConfig) -> Self {
        Self {
            connector,
            normalizer: DefaultNormalizer::new(export.free_text_field.clone()),
            writer: TabularWriter::new(export.columns.clone()),
            store: ExportStore::new(&export.output_dir),
            export,
            stats,
        }
    }

    pub fn store(&self) -> &ExportStore {
        &self.store
    }

    /// Open a session and produce enriched rows for `filters`
    #[instrument(skip(self))]
    pub async fn fetch_rows(&self, filters: &ExportFilters) -> Result<Vec<EnrichedRow>> {
        let session = self.connector.connect().await?;
        let pipeline = EnrichmentPipeline::new(session.as_ref(), &self.normalizer, &self.export, &self.stats);
        match pipeline.run(filters).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                if e.is_empty_result() {
                    crate::metrics::empty_export();
                }
                Err(e)
            }
        }
    }

    /// Render enriched rows. An empty row set is reported as "nothing found".
    pub fn render(&self, rows: &[EnrichedRow], filters: &ExportFilters) -> Result<String> {
        self.writer.serialize(rows).ok_or_else(|| ExportError::EmptyResult {
            filters: filters.describe(),
        })
    }

    /// Fetch, render and store one export file
    pub async fn export(&self, filters: &ExportFilters) -> Result<ExportOutcome> {
        let rows = self.fetch_rows(filters).await?;
        let content = self.render(&rows, filters)?;
        let filename = export_filename(filters, Local::now());
        let path = self.store.save(&filename, &content)?;
        crate::metrics::rows_exported(rows.len());
        info!("Exported {} partners to {}", rows.len(), filename);
        Ok(ExportOutcome {
            filename,
            path,
            count: rows.len(),
        })
    }

    /// Authenticate only; used by connection checks
    pub async fn test_connection(&self) -> Result<()> {
        self.connector.connect().await.map(|_| ())
    }
}
