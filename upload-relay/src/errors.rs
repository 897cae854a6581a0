use crate::crm::CrmError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Anything other than POST (OPTIONS is answered before this can happen)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Missing or malformed fields in the upload request
    #[error("{message}")]
    BadRequest { message: String },

    /// The CRM answered but did not accept the update
    #[error("{message}")]
    Rejected { message: String },

    /// The CRM call itself failed
    #[error(transparent)]
    Remote(#[from] CrmError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Rejected { .. } | Error::Remote(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Remote(_) => {
                tracing::error!("Error uploading files: {}", self);
            }
            Error::Rejected { .. } => {
                tracing::error!("CRM rejected update: {}", self);
            }
            Error::MethodNotAllowed | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        // Upload failures report `success: false`; everything before the outbound call does not.
        let body = match &self {
            Error::MethodNotAllowed | Error::BadRequest { .. } => json!({ "error": self.to_string() }),
            Error::Rejected { .. } | Error::Remote(_) => json!({
                "success": false,
                "error": self.to_string()
            }),
            Error::Other(e) => json!({
                "error": "Internal server error",
                "message": format!("{e:#}")
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
