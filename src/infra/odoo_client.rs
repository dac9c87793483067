use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument};

use crate::app::ports::{DataSourceConnector, DataSourcePort};
use crate::config::OdooConfig;
use crate::error::{ExportError, Result};
use crate::types::{raw_record_from_json, DomainFilter, RawRecord};

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC client for an Odoo instance (`/jsonrpc`)
#[derive(Clone)]
pub struct OdooClient {
    http: reqwest::Client,
    config: OdooConfig,
}

impl OdooClient {
    pub fn new(config: OdooConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/jsonrpc", self.config.url.trim_end_matches('/'))
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        let body = rpc_body(service, method, args);
        let resp = self.http.post(self.endpoint()).json(&body).send().await?;
        let payload: Value = resp.error_for_status()?.json().await?;
        parse_rpc_response(payload)
    }

    /// Log in and return the user id
    #[instrument(skip(self), fields(db = %self.config.db, user = %self.config.username))]
    pub async fn authenticate(&self) -> Result<i64> {
        if self.config.url.trim().is_empty() {
            return Err(ExportError::Config("Odoo URL not configured".to_string()));
        }
        let cfg = &self.config;
        let result = self
            .call(
                "common",
                "authenticate",
                json!([cfg.db, cfg.username, cfg.password, {}]),
            )
            .await
            .map_err(|e| ExportError::SourceUnavailable(e.to_string()))?;

        match result.as_i64() {
            Some(uid) if uid > 0 => {
                info!("Authenticated against Odoo as uid {}", uid);
                Ok(uid)
            }
            _ => Err(ExportError::SourceUnavailable(
                "Authentication failed, check Odoo credentials".to_string(),
            )),
        }
    }

    pub async fn open_session(&self) -> Result<OdooSession> {
        let uid = self.authenticate().await?;
        Ok(OdooSession {
            client: self.clone(),
            uid,
        })
    }
}

#[async_trait]
impl DataSourceConnector for OdooClient {
    async fn connect(&self) -> Result<Box<dyn DataSourcePort>> {
        Ok(Box::new(self.open_session().await?))
    }
}

/// An authenticated Odoo session, valid for one export or dispatch request
pub struct OdooSession {
    client: OdooClient,
    uid: i64,
}

impl OdooSession {
    async fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> Result<Value> {
        let cfg = &self.client.config;
        self.client
            .call(
                "object",
                "execute_kw",
                json!([cfg.db, self.uid, cfg.password, model, method, args, kwargs]),
            )
            .await
    }
}

#[async_trait]
impl DataSourcePort for OdooSession {
    #[instrument(skip(self, domain, fields), fields(terms = domain.len()))]
    async fn search_read(
        &self,
        model: &str,
        domain: &[DomainFilter],
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<RawRecord>> {
        let mut kwargs = json!({ "fields": fields });
        if let Some(limit) = limit {
            kwargs["limit"] = json!(limit);
        }
        let result = self
            .execute_kw(model, "search_read", json!([domain_json(domain)]), kwargs)
            .await?;
        let rows = rows_from_result(result)?;
        debug!("search_read on {} returned {} rows", model, rows.len());
        Ok(rows)
    }

    #[instrument(skip(self, domain, fields))]
    async fn read_group(
        &self,
        model: &str,
        domain: &[DomainFilter],
        fields: &[String],
        groupby: &str,
    ) -> Result<Vec<RawRecord>> {
        let result = self
            .execute_kw(
                model,
                "read_group",
                json!([domain_json(domain), fields, [groupby]]),
                json!({ "lazy": true }),
            )
            .await?;
        rows_from_result(result)
    }
}

fn domain_json(domain: &[DomainFilter]) -> Value {
    Value::Array(domain.iter().map(DomainFilter::to_json).collect())
}

fn rpc_body(service: &str, method: &str, args: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "params": { "service": service, "method": method, "args": args },
        "id": REQUEST_ID.fetch_add(1, Ordering::Relaxed),
    })
}

/// Extract `result`, or turn a JSON-RPC `error` into [`ExportError::Rpc`]
fn parse_rpc_response(payload: Value) -> Result<Value> {
    if let Some(error) = payload.get("error") {
        let message = error
            .pointer("/data/message")
            .or_else(|| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error")
            .to_string();
        return Err(ExportError::Rpc { message });
    }
    payload
        .get("result")
        .cloned()
        .ok_or_else(|| ExportError::Rpc {
            message: "response has neither result nor error".to_string(),
        })
}

fn rows_from_result(result: Value) -> Result<Vec<RawRecord>> {
    match result {
        Value::Array(rows) => Ok(rows.iter().map(raw_record_from_json).collect()),
        other => Err(ExportError::Rpc {
            message: format!("expected a list of records, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawValue;

    #[test]
    fn test_rpc_body_shape() {
        let body = rpc_body("common", "authenticate", json!(["db", "u", "p", {}]));
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "call");
        assert_eq!(body["params"]["service"], "common");
        assert_eq!(body["params"]["args"][0], "db");
        assert!(body["id"].is_u64());
    }

    #[test]
    fn test_parse_error_prefers_data_message() {
        let err = parse_rpc_response(json!({
            "error": {"message": "Odoo Server Error", "data": {"message": "Invalid field 'x'"}}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "RPC error: Invalid field 'x'");
    }

    #[test]
    fn test_parse_result_rows() {
        let result = parse_rpc_response(json!({
            "result": [{"id": 1, "x_studio_sales_rep": [4, "Manas"], "comment": false}]
        }))
        .unwrap();
        let rows = rows_from_result(result).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0]["x_studio_sales_rep"],
            RawValue::Relation { id: 4, label: Some("Manas".into()) }
        );
        assert_eq!(rows[0]["comment"], RawValue::Bool(false));
    }

    #[test]
    fn test_non_list_result_is_rejected() {
        assert!(rows_from_result(json!(false)).is_err());
    }

    #[test]
    fn test_domain_json() {
        let domain = vec![DomainFilter::equals("city", "Patna")];
        assert_eq!(domain_json(&domain), json!([["city", "=", "Patna"]]));
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let client = OdooClient::new(OdooConfig::default()).unwrap();
        assert!(matches!(client.authenticate().await, Err(ExportError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_source_unavailable() {
        let client = OdooClient::new(OdooConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..OdooConfig::default()
        })
        .unwrap();
        assert!(matches!(
            client.connect().await.err(),
            Some(ExportError::SourceUnavailable(_))
        ));
    }
}
