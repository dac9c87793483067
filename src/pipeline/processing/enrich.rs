use serde::Deserialize;
use tracing::{info, instrument};

use crate::app::ports::DataSourcePort;
use crate::config::{ExportConfig, StatsConfig};
use crate::constants::{CITY_FIELD, ID_FIELD, ORDER_COUNT_COLUMN, ORDER_TOTAL_COLUMN, SALES_REP_FIELD};
use crate::error::{ExportError, Result};
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::processing::stats::{StatsAggregator, StatsIndex};
use crate::types::{DomainFilter, EnrichedRow, RawRecord};

/// Query-time filters for a partner export
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExportFilters {
    pub city: Option<String>,
    pub sales_rep: Option<String>,
    pub max_rows: Option<u32>,
}

impl ExportFilters {
    pub fn new(city: Option<String>, sales_rep: Option<String>) -> Self {
        Self {
            city,
            sales_rep,
            max_rows: None,
        }
        .sanitized()
    }

    /// Treat blank filter values as absent
    pub fn sanitized(mut self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.city = blank_to_none(self.city);
        self.sales_rep = blank_to_none(self.sales_rep);
        self
    }

    pub fn domain(&self) -> Vec<DomainFilter> {
        let mut domain = Vec::new();
        if let Some(city) = &self.city {
            domain.push(DomainFilter::equals(CITY_FIELD, city.as_str()));
        }
        if let Some(rep) = &self.sales_rep {
            domain.push(DomainFilter::equals(SALES_REP_FIELD, rep.as_str()));
        }
        domain
    }

    /// Human description used in "nothing found" messages, e.g.
    /// ` with filters (city: Patna, sales rep: Manas)`
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(city) = &self.city {
            parts.push(format!("city: {city}"));
        }
        if let Some(rep) = &self.sales_rep {
            parts.push(format!("sales rep: {rep}"));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" with filters ({})", parts.join(", "))
        }
    }
}

/// Normalizes partner rows and joins them with order statistics
pub struct EnrichmentPipeline<'a> {
    source: &'a dyn DataSourcePort,
    normalizer: &'a dyn Normalizer,
    export: &'a ExportConfig,
    stats: &'a StatsConfig,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(
        source: &'a dyn DataSourcePort,
        normalizer: &'a dyn Normalizer,
        export: &'a ExportConfig,
        stats: &'a StatsConfig,
    ) -> Self {
        Self {
            source,
            normalizer,
            export,
            stats,
        }
    }

    /// Query partners matching `filters` and return enriched rows in source
    /// order. Zero matches is reported as [`ExportError::EmptyResult`].
    #[instrument(skip(self), fields(model = %self.export.model))]
    pub async fn run(&self, filters: &ExportFilters) -> Result<Vec<EnrichedRow>> {
        let limit = filters.max_rows.unwrap_or(self.export.max_rows);
        let raw = self
            .source
            .search_read(&self.export.model, &filters.domain(), &self.export.fields, Some(limit))
            .await
            .map_err(|e| match e {
                ExportError::SourceUnavailable(_) => e,
                other => ExportError::SourceUnavailable(other.to_string()),
            })?;

        if raw.is_empty() {
            return Err(ExportError::EmptyResult {
                filters: filters.describe(),
            });
        }

        let ids = collect_entity_ids(&raw);
        let stats = StatsAggregator::new(self.source, self.stats).collect(&ids).await;
        let rows = enrich_records(&raw, self.normalizer, &stats);
        info!("Enriched {} partner rows ({} with orders)", rows.len(), stats.len());
        Ok(rows)
    }
}

/// Ids of the records that carry one, in record order
pub fn collect_entity_ids(records: &[RawRecord]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.get(ID_FIELD).and_then(|v| v.as_ref_id()))
        .collect()
}

/// Normalize each record and attach `order_count`/`order_total`. Records
/// without an id get zero statistics.
pub fn enrich_records(records: &[RawRecord], normalizer: &dyn Normalizer, stats: &StatsIndex) -> Vec<EnrichedRow> {
    records
        .iter()
        .map(|raw| {
            let mut row = normalizer.normalize(raw);
            let stat = raw
                .get(ID_FIELD)
                .and_then(|v| v.as_ref_id())
                .map(|id| stats.lookup(id))
                .unwrap_or_default();
            row.insert(ORDER_COUNT_COLUMN, stat.count.to_string());
            row.insert(ORDER_TOTAL_COLUMN, format!("{:.2}", stat.total));
            row
        })
        .collect()
}
