use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// A submitted field failed validation; rendered as a DRF-style
    /// `{"<field>": ["<message>"]}` body.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("authentication required")]
    AuthenticationRequired,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation { field, message } => {
                let mut errors = serde_json::Map::new();
                errors.insert(field.to_string(), json!([message]));
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::Value::Object(errors)),
                )
                    .into_response()
            }
            AppError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Authentication credentials were not provided." })),
            )
                .into_response(),
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
