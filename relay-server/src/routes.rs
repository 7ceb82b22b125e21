//! The peripheral HTTP control surface (§6). Translates JSON bodies/query
//! params directly onto `RelayContext`'s control contract; no business
//! logic lives here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use relay_core::{RelayContext, RelayError, WorkerStatus};
use serde::{Deserialize, Serialize};

pub fn router(context: RelayContext) -> Router {
    Router::new()
        .route(
            "/channels/{id}/source",
            put(set_source).delete(stop_source),
        )
        .route("/channels/{id}/reset", axum::routing::post(reset_window))
        .route("/channels/{id}", get(status).delete(remove_channel))
        .route("/channels", get(list_channels))
        .with_state(context)
}

#[derive(Debug, Deserialize)]
struct SetSourceRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    active: bool,
    media_seq: u64,
    window_length: usize,
}

impl From<WorkerStatus> for StatusResponse {
    fn from(s: WorkerStatus) -> Self {
        Self {
            active: s.active,
            media_seq: s.media_seq,
            window_length: s.window_length,
        }
    }
}

async fn set_source(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
    Json(body): Json<SetSourceRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.set_source(&id, body.url).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_source(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.stop_source(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_window(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.reset_window(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_channel(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status(
    State(ctx): State<RelayContext>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(ctx.status(&id).await?.into()))
}

async fn list_channels(State(ctx): State<RelayContext>) -> Json<Vec<String>> {
    Json(ctx.list_channels().await)
}

/// Maps `RelayError` onto an HTTP response; `ChannelNotFound` becomes 404,
/// everything else a 500 (§7's "control operation on unknown channel").
struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}
