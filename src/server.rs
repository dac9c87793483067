use axum::{
    extract::Path,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::dispatch_use_case::{phones_from_rows, DispatchUseCase};
use crate::app::export_use_case::ExportUseCase;
use crate::config::Config;
use crate::error::{ExportError, Result};
use crate::infra::odoo_client::OdooClient;
use crate::infra::pacer_adapter::TokioPacer;
use crate::infra::whatsapp_client::WhatsAppClient;
use crate::pipeline::processing::enrich::ExportFilters;
use crate::pipeline::processing::phone::IndiaRule;

/// Use cases shared by the HTTP handlers and the CLI
pub struct AppState {
    pub export: ExportUseCase,
    pub dispatch: DispatchUseCase,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let connector = Arc::new(OdooClient::new(config.odoo.clone())?);
        let delivery = Arc::new(WhatsAppClient::new(config.whatsapp.clone())?);
        Ok(Self {
            export: ExportUseCase::new(connector, config.export.clone(), config.stats.clone()),
            dispatch: DispatchUseCase::new(
                delivery,
                Arc::new(TokioPacer),
                Arc::new(IndiaRule::new(config.whatsapp.country_code.clone())),
                config.whatsapp.delay(),
            ),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateCsvRequest {
    pub city: Option<String>,
    pub sales_rep: Option<String>,
}

/// Either explicit phones, or export filters whose partners' phones are used
#[derive(Debug, Deserialize)]
pub struct SendBulkRequest {
    pub phones: Option<Vec<String>>,
    pub message: String,
    pub city: Option<String>,
    pub sales_rep: Option<String>,
}

fn error_response(e: &ExportError) -> Response {
    let (status, message) = match e {
        ExportError::EmptyResult { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        ExportError::SourceUnavailable(_) | ExportError::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to connect to Odoo. Please check credentials. ({e})"),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "partner-export",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn generate_csv(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<GenerateCsvRequest>>,
) -> Response {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let filters = ExportFilters::new(req.city, req.sales_rep);
    match state.export.export(&filters).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "filename": outcome.filename,
            "count": outcome.count,
            "download_url": format!("/download/{}", outcome.filename),
        }))
        .into_response(),
        Err(e) => {
            if !e.is_empty_result() {
                error!("Export failed: {}", e);
            }
            error_response(&e)
        }
    }
}

async fn download(Extension(state): Extension<Arc<AppState>>, Path(filename): Path<String>) -> Response {
    let not_found = || (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response();
    let Some(path) = state.export.store().locate(&filename) else {
        return not_found();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

async fn test_connection(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.export.test_connection().await {
        Ok(()) => Json(json!({ "success": true, "message": "Successfully connected to Odoo" })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": e.to_string() })),
        )
            .into_response(),
    }
}

async fn send_bulk(Extension(state): Extension<Arc<AppState>>, Json(req): Json<SendBulkRequest>) -> Response {
    if req.message.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "message is required" }))).into_response();
    }
    let phones = match req.phones {
        Some(phones) => phones,
        None => {
            let filters = ExportFilters::new(req.city, req.sales_rep);
            match state.export.fetch_rows(&filters).await {
                Ok(rows) => phones_from_rows(&rows),
                Err(e) => return error_response(&e),
            }
        }
    };
    Json(state.dispatch.send_bulk(phones, req.message).await).into_response()
}

async fn verify_whatsapp(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "success": state.dispatch.verify_credentials().await }))
}

/// Create the HTTP router with all routes
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/generate-csv", post(generate_csv))
        .route("/download/:filename", get(download))
        .route("/api/test-connection", get(test_connection))
        .route("/api/send-bulk", post(send_bulk))
        .route("/api/whatsapp/verify", get(verify_whatsapp))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on `host:port`
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    info!("HTTP server running on http://{}", addr);
    hyper::Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
