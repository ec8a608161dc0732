//! Whiteboard procedure routes.

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod tests;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

use crate::model::{CreateWhiteboardBody, ErrorBody, ErrorCode, UpdateWhiteboardBody, WhiteboardRecord};
use crate::services::whiteboard::{self, WhiteboardError};
use crate::state::AppState;

/// Service error rendered as `{ "error", "code" }` with a matching status.
pub struct RouteError(WhiteboardError);

impl From<WhiteboardError> for RouteError {
    fn from(err: WhiteboardError) -> Self {
        Self(err)
    }
}

pub(crate) fn whiteboard_error_to_status(err: &WhiteboardError) -> StatusCode {
    match err {
        WhiteboardError::InvalidId | WhiteboardError::InvalidContent(_) => StatusCode::BAD_REQUEST,
        WhiteboardError::AlreadyExists(_) => StatusCode::CONFLICT,
        WhiteboardError::Serialize(_) | WhiteboardError::CorruptContent { .. } | WhiteboardError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = whiteboard_error_to_status(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.error_code(), "whiteboard request failed");
        }
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}

/// `GET /api/whiteboard/{id}`: the record, or `null` when absent.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<WhiteboardRecord>>, RouteError> {
    let record = whiteboard::get_by_id(state.store.as_ref(), &id).await?;
    Ok(Json(record))
}

/// `POST /api/whiteboard`: create a new whiteboard.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateWhiteboardBody>,
) -> Result<(StatusCode, Json<WhiteboardRecord>), RouteError> {
    let record = whiteboard::create(state.store.as_ref(), &body.id, body.content).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /api/whiteboard/{id}`: create or replace a whiteboard's content.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateWhiteboardBody>,
) -> Result<Json<WhiteboardRecord>, RouteError> {
    let record = whiteboard::update(state.store.as_ref(), &id, body.content).await?;
    Ok(Json(record))
}
