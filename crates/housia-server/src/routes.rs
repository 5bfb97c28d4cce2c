use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use housia_core::AppError;
use housia_core::traits::{Broker, ListingStore, StatusStore};

use crate::dto::{ErrorResponse, HealthResponse, SubmitRequest, SubmitResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the router for submission, status and health.
pub fn router<B, L, S>(state: Arc<AppState<B, L, S>>) -> Router
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    Router::new()
        .route("/health", get(health))
        .route("/v1/scrape", post(submit::<B, L, S>))
        .route("/v1/scrape/jobs/{id}", get(job_status::<B, L, S>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Queue a listing url for scraping. The outcome is polled via [`job_status`].
pub async fn submit<B, L, S>(
    State(state): State<Arc<AppState<B, L, S>>>,
    body: Result<axum::Json<SubmitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    let axum::Json(body) =
        body.map_err(|e| AppError::ValidationError(format!("invalid request body: {e}")))?;

    let descriptor = state.gateway.submit(&body.url).await?;

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(SubmitResponse::from(descriptor)),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

pub async fn job_status<B, L, S>(
    State(state): State<Arc<AppState<B, L, S>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    match state.gateway.query_status(&id).await? {
        Some(record) => Ok(axum::Json(record).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            axum::Json(ErrorResponse {
                error: "not_found".to_string(),
                message: format!("Job {id} not found"),
            }),
        )
            .into_response()),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse { status: "healthy" })
}
