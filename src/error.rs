//! Typed errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::apis::ApiError;
use crate::orm::OrmError;
use crate::web::reply::RenderError;

/// Malformed or missing request input, raised by the binder. Surfaces as
/// 400 with the message as plain text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BadRequest(pub String);

impl BadRequest {
    pub fn new(message: impl Into<String>) -> BadRequest {
        BadRequest(message.into())
    }
}

/// Everything an endpoint can fail with. Business rejections ([`ApiError`])
/// are converted back into a JSON body at the dispatch boundary instead of
/// propagating; the rest map to 400 or 500 here.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Bad(#[from] BadRequest),
    #[error(transparent)]
    Db(#[from] OrmError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Bad(bad) => (StatusCode::BAD_REQUEST, bad.to_string()).into_response(),
            HandlerError::Api(api) => (StatusCode::OK, Json(api.body())).into_response(),
            other => {
                tracing::error!(error = %other, "handler failed");
                let body = serde_json::json!({
                    "error": "internal:error",
                    "data": "",
                    "message": other.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
