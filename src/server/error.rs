use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::EmbedError;
use crate::response::{ErrorBody, ErrorResponse};

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by HTTP handlers. Bodies always use the
/// `{error:{message,type,code}}` shape.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Embed(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ServerError::Embed(err) => err.to_response(),
            other => ErrorResponse {
                error: ErrorBody {
                    message: other.to_string(),
                    kind: match other {
                        ServerError::NotFound => "NotFound",
                        _ => "InvalidRequest",
                    }
                    .to_string(),
                    code: other.status_code().as_u16(),
                },
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}
