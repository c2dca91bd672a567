//! HTTP handlers for the import service

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::reader::{parse_delimited_text, parse_spreadsheet};
use crate::report::ImportResult;
use crate::AppState;
use rxcatalog_common::errors::{AppError, Result};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - checks the database
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let db_check = match state.db.ping().await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let all_healthy = db_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            database: db_check,
        },
    })
}

/// Upload format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl Default for UploadFormat {
    fn default() -> Self {
        Self::Csv
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub format: UploadFormat,
}

/// Run a catalog import over the uploaded file.
///
/// The body is the raw upload. A malformed spreadsheet is a fatal parse
/// error and maps to HTTP 400 before any writes; per-row and per-chunk
/// problems are reported inside the returned `ImportResult`, with HTTP 200.
pub async fn import_catalog(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> Result<Json<ImportResult>> {
    let limit = state.config.server.max_upload_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: body.len(),
            limit,
        });
    }

    let rows = match params.format {
        UploadFormat::Csv => parse_delimited_text(&String::from_utf8_lossy(&body)),
        UploadFormat::Xlsx => parse_spreadsheet(&body)?,
    };

    let result = state.importer.run(rows).await?;
    Ok(Json(result))
}
