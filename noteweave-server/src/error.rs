use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use noteweave_index::IndexError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Index(err) => match err {
                IndexError::Collision { .. }
                | IndexError::FilenameCollision { .. }
                | IndexError::FolderExists(_)
                | IndexError::FolderNotEmpty { .. } => StatusCode::CONFLICT,
                IndexError::NotFound { .. }
                | IndexError::FolderNotFound(_)
                | IndexError::TrashItemNotFound(_) => StatusCode::NOT_FOUND,
                IndexError::InvalidName(_) => StatusCode::BAD_REQUEST,
                IndexError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                IndexError::MissingDataDir | IndexError::Io(_) | IndexError::Notify(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!(%status, "request rejected: {self}");
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
