pub mod health;
pub mod hooks;

pub use health::*;
pub use hooks::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bomsync_utils::{BomSyncError, ErrorResponse};

/// Maps a `BomSyncError` onto its HTTP status and JSON body.
#[derive(Debug)]
pub struct ApiError(pub BomSyncError);

impl From<BomSyncError> for ApiError {
    fn from(error: BomSyncError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}
