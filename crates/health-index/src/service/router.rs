use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::scoring::{RollupRequest, ScoringService, ScoringServiceError};
use super::store::ConfigStore;
use crate::scoring::{Measurement, SnapshotDocument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub measurements: Vec<Measurement>,
}

/// Router builder exposing configuration, batch scoring, and CHQ endpoints.
pub fn scoring_router<S>(service: Arc<ScoringService<S>>) -> Router
where
    S: ConfigStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/config/snapshot",
            get(snapshot_handler::<S>).put(replace_snapshot_handler::<S>),
        )
        .route("/api/v1/health-index/batches", post(batch_handler::<S>))
        .route("/api/v1/chq/rollup", post(rollup_handler::<S>))
        .with_state(service)
}

pub(crate) async fn snapshot_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
) -> Response
where
    S: ConfigStore + 'static,
{
    match service.current_config() {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn replace_snapshot_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(document): axum::Json<SnapshotDocument>,
) -> Response
where
    S: ConfigStore + 'static,
{
    match service.replace_config(document) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn batch_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response
where
    S: ConfigStore + 'static,
{
    let outcome =
        tokio::task::spawn_blocking(move || service.score_batch(&request.measurements)).await;

    match outcome {
        Ok(Ok(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(Err(other)) => error_response(other),
        Err(join) => internal_error(join.to_string()),
    }
}

pub(crate) async fn rollup_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<RollupRequest>,
) -> Response
where
    S: ConfigStore + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || service.company_rollup(request)).await;

    match outcome {
        Ok(Ok(rollup)) => (StatusCode::OK, axum::Json(rollup)).into_response(),
        Ok(Err(other)) => error_response(other),
        Err(join) => internal_error(join.to_string()),
    }
}

fn error_response(error: ScoringServiceError) -> Response {
    match error {
        ScoringServiceError::Rollup(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        other => internal_error(other.to_string()),
    }
}

fn internal_error(message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
