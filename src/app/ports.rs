use async_trait::async_trait;
use std::time::Duration;

use crate::error::{DeliveryError, Result};
use crate::types::{DomainFilter, RawRecord};

/// An authenticated session against the remote record source
#[async_trait]
pub trait DataSourcePort: Send + Sync {
    /// Filtered record search, returning rows in source order
    async fn search_read(
        &self,
        model: &str,
        domain: &[DomainFilter],
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<RawRecord>>;

    /// Server-side grouped aggregation, one row per group
    async fn read_group(
        &self,
        model: &str,
        domain: &[DomainFilter],
        fields: &[String],
        groupby: &str,
    ) -> Result<Vec<RawRecord>>;
}

/// Opens a fresh [`DataSourcePort`] session. Authentication failures surface
/// as `ExportError::SourceUnavailable`.
#[async_trait]
pub trait DataSourceConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DataSourcePort>>;
}

/// Single-recipient text delivery
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    /// Whether a credential is present at all
    fn is_configured(&self) -> bool;

    /// Send `body` to a canonical phone, returning the provider message id
    async fn send_text(&self, phone: &str, body: &str) -> std::result::Result<String, DeliveryError>;

    async fn verify_credentials(&self) -> bool;
}

/// Pause between consecutive deliveries
#[async_trait]
pub trait PacerPort: Send + Sync {
    async fn pause(&self, delay: Duration);
}
