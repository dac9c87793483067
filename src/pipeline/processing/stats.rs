use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

use crate::app::ports::DataSourcePort;
use crate::config::{StatsConfig, StatsStrategy};
use crate::error::Result;
use crate::types::{DomainFilter, RawRecord};

/// Order count and amount sum for one partner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatValue {
    pub count: u64,
    pub total: f64,
}

/// Per-partner statistics, keyed by partner id. Unknown ids read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsIndex {
    entries: HashMap<i64, StatValue>,
}

impl StatsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: i64) -> StatValue {
        self.entries.get(&key).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `count` orders worth `amount` to `key`. Negative or non-finite
    /// amounts contribute nothing to the total.
    pub fn add(&mut self, key: i64, count: u64, amount: f64) {
        let entry = self.entries.entry(key).or_default();
        entry.count += count;
        if amount.is_finite() && amount > 0.0 {
            entry.total += amount;
        }
    }

    /// Group individual order rows by owner. Rows whose owner reference is
    /// missing or not numeric are skipped.
    pub fn from_transactions(records: &[RawRecord], owner_field: &str, amount_field: &str) -> Self {
        let mut index = Self::new();
        let mut skipped = 0usize;
        for record in records {
            let Some(owner) = record.get(owner_field).and_then(|v| v.as_ref_id()) else {
                skipped += 1;
                continue;
            };
            let amount = record.get(amount_field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            index.add(owner, 1, amount);
        }
        if skipped > 0 {
            debug!("Skipped {} order rows with malformed {}", skipped, owner_field);
        }
        index
    }

    /// Fold rows from a grouped aggregation. The group size is read from
    /// `<owner>_count` or `__count`, whichever the source provides.
    pub fn from_groups(groups: &[RawRecord], owner_field: &str, amount_field: &str) -> Self {
        let count_field = format!("{owner_field}_count");
        let mut index = Self::new();
        for group in groups {
            let Some(owner) = group.get(owner_field).and_then(|v| v.as_ref_id()) else {
                continue;
            };
            let count = group
                .get(&count_field)
                .or_else(|| group.get("__count"))
                .and_then(|v| v.as_f64())
                .filter(|c| *c >= 0.0)
                .unwrap_or(0.0) as u64;
            let amount = group.get(amount_field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            index.add(owner, count, amount);
        }
        index
    }

    /// Keep only the given partners
    pub fn restrict_to(mut self, ids: &[i64]) -> Self {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        self.entries.retain(|k, _| wanted.contains(k));
        self
    }
}

/// Best-effort order statistics for a set of partners
pub struct StatsAggregator<'a> {
    source: &'a dyn DataSourcePort,
    config: &'a StatsConfig,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(source: &'a dyn DataSourcePort, config: &'a StatsConfig) -> Self {
        Self { source, config }
    }

    /// Build the index for `ids`. A failing source yields an empty index so
    /// that the export can still proceed with zero statistics.
    #[instrument(skip(self, ids), fields(partners = ids.len(), strategy = ?self.config.strategy))]
    pub async fn collect(&self, ids: &[i64]) -> StatsIndex {
        if ids.is_empty() {
            return StatsIndex::new();
        }
        match self.fetch(ids).await {
            Ok(index) => {
                debug!("Collected order statistics for {} partners", index.len());
                index.restrict_to(ids)
            }
            Err(e) => {
                warn!("Order statistics unavailable, continuing with zeros: {}", e);
                crate::metrics::stats_fallback();
                StatsIndex::new()
            }
        }
    }

    fn domain(&self, ids: &[i64]) -> Vec<DomainFilter> {
        let statuses: Vec<Value> = self.config.statuses.iter().map(|s| Value::from(s.as_str())).collect();
        vec![
            DomainFilter::one_of(&self.config.owner_field, Value::from(ids.to_vec())),
            DomainFilter::one_of(&self.config.state_field, Value::Array(statuses)),
        ]
    }

    async fn fetch(&self, ids: &[i64]) -> Result<StatsIndex> {
        let cfg = self.config;
        let domain = self.domain(ids);
        match cfg.strategy {
            StatsStrategy::Transactions => {
                let fields = vec![cfg.owner_field.clone(), cfg.amount_field.clone()];
                let rows = self.source.search_read(&cfg.model, &domain, &fields, None).await?;
                Ok(StatsIndex::from_transactions(&rows, &cfg.owner_field, &cfg.amount_field))
            }
            StatsStrategy::Grouped => {
                let fields = vec![cfg.owner_field.clone(), format!("{}:sum", cfg.amount_field)];
                let groups = self
                    .source
                    .read_group(&cfg.model, &domain, &fields, &cfg.owner_field)
                    .await?;
                Ok(StatsIndex::from_groups(&groups, &cfg.owner_field, &cfg.amount_field))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::types::{raw_record_from_json, RawValue};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn rows(values: Value) -> Vec<RawRecord> {
        values.as_array().unwrap().iter().map(raw_record_from_json).collect()
    }

    struct FakeSource {
        rows: Vec<RawRecord>,
        fail: bool,
        calls: Mutex<Vec<(String, Vec<DomainFilter>)>>,
    }

    impl FakeSource {
        fn new(rows: Vec<RawRecord>) -> Self {
            Self { rows, fail: false, calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl DataSourcePort for FakeSource {
        async fn search_read(
            &self,
            model: &str,
            domain: &[DomainFilter],
            _fields: &[String],
            _limit: Option<u32>,
        ) -> Result<Vec<RawRecord>> {
            self.calls.lock().unwrap().push((format!("search_read:{model}"), domain.to_vec()));
            if self.fail {
                return Err(ExportError::Rpc { message: "timeout".into() });
            }
            Ok(self.rows.clone())
        }

        async fn read_group(
            &self,
            model: &str,
            domain: &[DomainFilter],
            _fields: &[String],
            _groupby: &str,
        ) -> Result<Vec<RawRecord>> {
            self.calls.lock().unwrap().push((format!("read_group:{model}"), domain.to_vec()));
            if self.fail {
                return Err(ExportError::Rpc { message: "timeout".into() });
            }
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn test_groups_transactions_by_owner() {
        let index = StatsIndex::from_transactions(
            &rows(json!([
                {"partner_id": [1, "A"], "amount_total": 100.0},
                {"partner_id": [1, "A"], "amount_total": 50.5},
                {"partner_id": [2, "B"], "amount_total": 10},
            ])),
            "partner_id",
            "amount_total",
        );
        assert_eq!(index.lookup(1), StatValue { count: 2, total: 150.5 });
        assert_eq!(index.lookup(2), StatValue { count: 1, total: 10.0 });
    }

    #[test]
    fn test_unknown_key_reads_zero() {
        let index = StatsIndex::new();
        assert_eq!(index.lookup(999), StatValue { count: 0, total: 0.0 });
    }

    #[test]
    fn test_malformed_owner_is_excluded() {
        let mut records = rows(json!([
            {"partner_id": false, "amount_total": 5},
            {"amount_total": 5},
            {"partner_id": "abc", "amount_total": 5},
            {"partner_id": [3, "C"], "amount_total": "7.5"},
        ]));
        records.push(
            [("partner_id".to_string(), RawValue::Str("4".into()))].into_iter().collect(),
        );
        let index = StatsIndex::from_transactions(&records, "partner_id", "amount_total");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(3), StatValue { count: 1, total: 7.5 });
        assert_eq!(index.lookup(4), StatValue { count: 1, total: 0.0 });
    }

    #[test]
    fn test_grouped_rows() {
        let index = StatsIndex::from_groups(
            &rows(json!([
                {"partner_id": [1, "A"], "partner_id_count": 3, "amount_total": 300.0},
                {"partner_id": [2, "B"], "__count": 1, "amount_total": 20.0},
                {"partner_id": false, "partner_id_count": 9, "amount_total": 1.0},
            ])),
            "partner_id",
            "amount_total",
        );
        assert_eq!(index.lookup(1), StatValue { count: 3, total: 300.0 });
        assert_eq!(index.lookup(2), StatValue { count: 1, total: 20.0 });
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_filters_by_configured_statuses() {
        let source = FakeSource::new(rows(json!([
            {"partner_id": [1, "A"], "amount_total": 10.0},
            {"partner_id": [8, "Z"], "amount_total": 10.0},
        ])));
        let config = StatsConfig::default();
        let index = StatsAggregator::new(&source, &config).collect(&[1, 2]).await;

        assert_eq!(index.lookup(1).count, 1);
        assert_eq!(index.lookup(8).count, 0, "ids outside the request are dropped");

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "search_read:sale.order");
        assert_eq!(calls[0].1[0].to_json(), json!(["partner_id", "in", [1, 2]]));
        assert_eq!(calls[0].1[1].to_json(), json!(["state", "in", ["sale", "done"]]));
    }

    #[tokio::test]
    async fn test_collect_grouped_strategy() {
        let source = FakeSource::new(rows(json!([
            {"partner_id": [1, "A"], "partner_id_count": 2, "amount_total": 40.0},
        ])));
        let config = StatsConfig { strategy: StatsStrategy::Grouped, ..StatsConfig::default() };
        let index = StatsAggregator::new(&source, &config).collect(&[1]).await;
        assert_eq!(index.lookup(1), StatValue { count: 2, total: 40.0 });
        assert_eq!(source.calls.lock().unwrap()[0].0, "read_group:sale.order");
    }

    #[tokio::test]
    async fn test_source_failure_yields_empty_index() {
        let mut source = FakeSource::new(Vec::new());
        source.fail = true;
        let config = StatsConfig::default();
        let index = StatsAggregator::new(&source, &config).collect(&[1]).await;
        assert!(index.is_empty());
        assert_eq!(index.lookup(1), StatValue::default());
    }

    #[tokio::test]
    async fn test_no_ids_skips_remote_call() {
        let source = FakeSource::new(Vec::new());
        let config = StatsConfig::default();
        let index = StatsAggregator::new(&source, &config).collect(&[]).await;
        assert!(index.is_empty());
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
