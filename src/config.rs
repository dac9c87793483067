use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{ExportError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub odoo: OdooConfig,
    pub whatsapp: WhatsAppConfig,
    pub export: ExportConfig,
    pub stats: StatsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OdooConfig {
    pub url: String,
    pub db: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            db: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl OdooConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub api_version: String,
    pub phone_number_id: String,
    pub access_token: Option<String>,
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    pub country_code: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".to_string(),
            api_version: "v21.0".to_string(),
            phone_number_id: String::new(),
            access_token: None,
            delay_ms: constants::DEFAULT_MESSAGE_DELAY_MS,
            timeout_seconds: 10,
            country_code: constants::DEFAULT_COUNTRY_CODE.to_string(),
        }
    }
}

impl WhatsAppConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn has_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub model: String,
    pub fields: Vec<String>,
    pub columns: Vec<String>,
    pub free_text_field: String,
    pub max_rows: u32,
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            model: constants::PARTNER_MODEL.to_string(),
            fields: constants::partner_fields(),
            columns: constants::export_columns(),
            free_text_field: constants::NOTES_FIELD.to_string(),
            max_rows: constants::DEFAULT_MAX_ROWS,
            output_dir: "exports".to_string(),
        }
    }
}

/// How per-partner order statistics are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsStrategy {
    /// Read individual orders and group them locally
    Transactions,
    /// Let the source group and sum
    Grouped,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub model: String,
    pub owner_field: String,
    pub amount_field: String,
    pub state_field: String,
    /// Order states counted toward the statistics
    pub statuses: Vec<String>,
    pub strategy: StatsStrategy,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            model: constants::ORDER_MODEL.to_string(),
            owner_field: constants::ORDER_PARTNER_FIELD.to_string(),
            amount_field: constants::ORDER_AMOUNT_FIELD.to_string(),
            state_field: constants::ORDER_STATE_FIELD.to_string(),
            statuses: constants::confirmed_order_states(),
            strategy: StatsStrategy::Transactions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory when present, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override settings from a key lookup (the process environment in
    /// production). Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key) {
                *target = v;
            }
        };
        set(&mut self.odoo.url, "ODOO_URL");
        set(&mut self.odoo.db, "ODOO_DB");
        set(&mut self.odoo.username, "ODOO_USERNAME");
        set(&mut self.odoo.password, "ODOO_PASSWORD");
        set(&mut self.whatsapp.phone_number_id, "WHATSAPP_PHONE_NUMBER_ID");
        set(&mut self.whatsapp.api_version, "WHATSAPP_API_VERSION");
        set(&mut self.server.host, "SERVER_HOST");
        set(&mut self.export.output_dir, "EXPORT_DIR");

        if let Some(token) = lookup("WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = Some(token);
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(delay) = lookup("WHATSAPP_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.whatsapp.delay_ms = delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.stats.statuses, vec!["sale", "done"]);
        assert_eq!(config.stats.strategy, StatsStrategy::Transactions);
        assert_eq!(config.whatsapp.delay(), Duration::from_secs(2));
        assert_eq!(config.export.max_rows, 1000);
        assert_eq!(config.export.columns.last().map(String::as_str), Some("order_total"));
        assert!(!config.whatsapp.has_token());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [odoo]
            url = "https://example.odoo.com"
            db = "example"

            [stats]
            statuses = ["sale"]
            strategy = "grouped"
            "#,
        )
        .unwrap();
        assert_eq!(config.odoo.url, "https://example.odoo.com");
        assert_eq!(config.odoo.timeout_seconds, 30);
        assert_eq!(config.stats.statuses, vec!["sale"]);
        assert_eq!(config.stats.strategy, StatsStrategy::Grouped);
        assert_eq!(config.stats.model, "sale.order");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ODOO_URL", "https://env.odoo.com"),
            ("WHATSAPP_ACCESS_TOKEN", "secret"),
            ("SERVER_PORT", "8080"),
            ("WHATSAPP_DELAY_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.odoo.url, "https://env.odoo.com");
        assert!(config.whatsapp.has_token());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.whatsapp.delay_ms, 2000);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(matches!(Config::from_toml("odoo = 3"), Err(ExportError::Toml(_))));
    }
}
