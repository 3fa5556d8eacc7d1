//! HTTP surface
//!
//! One GET endpoint per analysis, a unified endpoint dispatching on `type`,
//! and the POST portfolio backtest. CORS is wide open and every error
//! becomes a JSON `{"error": ...}` body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::analysis::{self, AnalysisContext};
use crate::backtest::{self, BacktestRequest};
use crate::error::Error;
use crate::lstm;

const SUPPORTED_TYPES: &[&str] = &[
    "mfi",
    "rsi",
    "bollinger",
    "capm",
    "garch",
    "industry",
    "speedtraffic",
];

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type Ctx = State<Arc<AnalysisContext>>;

#[derive(Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisQuery {
    symbol: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct LstmQuery {
    symbol: Option<String>,
    reference_date: Option<NaiveDate>,
}

fn require_symbol(symbol: &Option<String>) -> Result<String, ApiError> {
    symbol
        .as_deref()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError(Error::InvalidInput("symbol parameter is required".into())))
}

async fn rsi_handler(State(ctx): Ctx, Query(q): Query<SymbolQuery>) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::rsi::run(&ctx, &symbol).await?).into_response())
}

async fn mfi_handler(State(ctx): Ctx, Query(q): Query<SymbolQuery>) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::mfi::run(&ctx, &symbol).await?).into_response())
}

async fn bollinger_handler(
    State(ctx): Ctx,
    Query(q): Query<SymbolQuery>,
) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::bollinger::run(&ctx, &symbol).await?).into_response())
}

async fn capm_handler(State(ctx): Ctx, Query(q): Query<SymbolQuery>) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::capm::run(&ctx, &symbol).await?).into_response())
}

async fn garch_handler(State(ctx): Ctx, Query(q): Query<SymbolQuery>) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::garch::run(&ctx, &symbol).await?).into_response())
}

async fn industry_handler(
    State(ctx): Ctx,
    Query(q): Query<SymbolQuery>,
) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    Ok(Json(analysis::industry::run(&ctx, &symbol).await?).into_response())
}

async fn lstm_handler(State(ctx): Ctx, Query(q): Query<LstmQuery>) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    let config = lstm::TrainConfig::default();
    Ok(Json(lstm::run(&ctx, &symbol, q.reference_date, &config).await?).into_response())
}

async fn analysis_handler(
    State(ctx): Ctx,
    Query(q): Query<AnalysisQuery>,
) -> Result<Response, ApiError> {
    let symbol = require_symbol(&q.symbol)?;
    let kind = q
        .kind
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError(Error::InvalidInput("type parameter is required".into())))?;

    let body = match kind.as_str() {
        "mfi" => serde_json::to_value(analysis::mfi::run(&ctx, &symbol).await?),
        "rsi" => serde_json::to_value(analysis::rsi::run(&ctx, &symbol).await?),
        "bollinger" => serde_json::to_value(analysis::bollinger::run(&ctx, &symbol).await?),
        "capm" => serde_json::to_value(analysis::capm::run(&ctx, &symbol).await?),
        "garch" => serde_json::to_value(analysis::garch::run(&ctx, &symbol).await?),
        "industry" => serde_json::to_value(analysis::industry::run(&ctx, &symbol).await?),
        "speedtraffic" => serde_json::to_value(analysis::unified::run(&ctx, &symbol).await?),
        other => {
            return Err(ApiError(Error::InvalidInput(format!(
                "unsupported analysis type: {}. Supported types: {}",
                other,
                SUPPORTED_TYPES.join(", ")
            ))))
        }
    };
    Ok(Json(body.map_err(Error::from)?).into_response())
}

async fn backtest_handler(
    State(ctx): Ctx,
    Json(request): Json<BacktestRequest>,
) -> Result<Response, ApiError> {
    let data = backtest::run(&ctx, &request).await?;
    Ok(Json(json!({ "success": true, "data": data })).into_response())
}

pub fn router(ctx: Arc<AnalysisContext>) -> Router {
    Router::new()
        .route("/api/rsi", get(rsi_handler))
        .route("/api/mfi", get(mfi_handler))
        .route("/api/bollinger", get(bollinger_handler))
        .route("/api/capm", get(capm_handler))
        .route("/api/garch", get(garch_handler))
        .route("/api/industry", get(industry_handler))
        .route("/api/lstm", get(lstm_handler))
        .route("/api/analysis", get(analysis_handler))
        .route("/api/backtest", post(backtest_handler))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

pub async fn serve(ctx: Arc<AnalysisContext>, addr: SocketAddr) -> crate::error::Result<()> {
    let app = router(ctx);
    info!(%addr, "speedtraffic server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| Error::Io(err.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|err| Error::Io(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_symbol() {
        assert_eq!(require_symbol(&Some(" tsla ".into())).unwrap(), "TSLA");
        assert!(require_symbol(&Some("  ".into())).is_err());
        assert!(require_symbol(&None).is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::InsufficientData("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::RateLimit, StatusCode::TOO_MANY_REQUESTS),
            (Error::Network("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Model("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
