use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No customers found{filters}.")]
    EmptyResult { filters: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {message}")]
    Rpc { message: String },
}

impl ExportError {
    /// True for the "nothing matched" outcome, which callers report as a
    /// user-facing condition rather than a system failure.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ExportError::EmptyResult { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Failure of a single outbound message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("WhatsApp access token not configured")]
    NotConfigured,

    #[error("{0}")]
    Transport(String),

    /// Error payload returned by the provider, kept verbatim.
    #[error("{0}")]
    Provider(serde_json::Value),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}
