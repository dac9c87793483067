#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use partner_export::app::ports::{DataSourceConnector, DataSourcePort, DeliveryPort, PacerPort};
use partner_export::error::{DeliveryError, ExportError, Result};
use partner_export::types::{raw_record_from_json, DomainFilter, RawRecord};

/// In-memory partner and order tables answering search_read the way Odoo does
#[derive(Clone, Default)]
pub struct MemorySource {
    pub partners: Vec<Value>,
    pub orders: Vec<Value>,
    pub fail_orders: bool,
}

fn matches(record: &Value, filter: &DomainFilter) -> bool {
    let actual = record.get(&filter.field).cloned().unwrap_or(Value::Null);
    let key = match &actual {
        Value::Array(pair) => pair.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    match filter.operator.as_str() {
        "=" => actual == filter.value,
        "in" => filter.value.as_array().map(|vs| vs.contains(&key)).unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl DataSourcePort for MemorySource {
    async fn search_read(
        &self,
        model: &str,
        domain: &[DomainFilter],
        _fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<RawRecord>> {
        let table = match model {
            "res.partner" => &self.partners,
            "sale.order" if self.fail_orders => {
                return Err(ExportError::Rpc {
                    message: "Access Denied".to_string(),
                })
            }
            "sale.order" => &self.orders,
            other => return Err(ExportError::Config(format!("unknown model {other}"))),
        };
        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(table
            .iter()
            .filter(|r| domain.iter().all(|f| matches(r, f)))
            .take(limit)
            .map(raw_record_from_json)
            .collect())
    }

    async fn read_group(
        &self,
        _model: &str,
        _domain: &[DomainFilter],
        _fields: &[String],
        _groupby: &str,
    ) -> Result<Vec<RawRecord>> {
        Err(ExportError::Rpc {
            message: "read_group not supported".to_string(),
        })
    }
}

/// Hands out clones of a [`MemorySource`], or refuses to authenticate
pub struct MemoryConnector {
    pub source: Option<MemorySource>,
}

impl MemoryConnector {
    pub fn new(source: MemorySource) -> Self {
        Self { source: Some(source) }
    }

    pub fn unreachable() -> Self {
        Self { source: None }
    }
}

#[async_trait]
impl DataSourceConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn DataSourcePort>> {
        match &self.source {
            Some(source) => Ok(Box::new(source.clone())),
            None => Err(ExportError::SourceUnavailable("authentication failed".to_string())),
        }
    }
}

/// Ordered log of sends and pauses
#[derive(Default)]
pub struct Journal(pub Mutex<Vec<String>>);

impl Journal {
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Accepts every phone except those listed in `reject`
pub struct FakeDelivery {
    pub configured: bool,
    pub reject: Vec<String>,
    pub journal: Arc<Journal>,
}

#[async_trait]
impl DeliveryPort for FakeDelivery {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send_text(&self, phone: &str, _body: &str) -> std::result::Result<String, DeliveryError> {
        self.journal.record(format!("send {phone}"));
        if self.reject.iter().any(|p| p == phone) {
            Err(DeliveryError::Transport("connection reset".to_string()))
        } else {
            Ok(format!("wamid.{phone}"))
        }
    }

    async fn verify_credentials(&self) -> bool {
        self.configured
    }
}

pub struct JournalPacer {
    pub journal: Arc<Journal>,
}

#[async_trait]
impl PacerPort for JournalPacer {
    async fn pause(&self, delay: Duration) {
        self.journal.record(format!("pause {}ms", delay.as_millis()));
    }
}
