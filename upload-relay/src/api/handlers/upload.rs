use crate::AppState;
use crate::api::models::upload::{UploadRequest, UploadSummary};
use crate::errors::{Error, Result};
use anyhow::Context;
use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{info, instrument};

// ANY * - Attach uploaded files to a CRM deal
//
// OPTIONS is answered with an empty 200 for preflight, anything but POST is refused. The body is
// buffered in full (bounded by `limits.max_body_size`) and relayed in a single update call.
#[instrument(skip_all, fields(method = %method))]
pub async fn upload_files(State(state): State<AppState>, method: Method, body: Bytes) -> Result<Response> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    if method != Method::POST {
        return Err(Error::MethodNotAllowed);
    }

    let upload = UploadRequest::from_slice(&body)
        .context("Failed to parse request body as JSON")?
        .validate()?;

    info!("Processing {} files for deal {}", upload.files.len(), upload.deal_id);
    info!("Using field: {}", upload.file_field);

    let payload = upload.to_payload();
    info!("Updating deal with {} files", upload.files.len());

    let reply = state.crm.update_deal(&upload.webhook, &payload).await?;

    if !reply.is_success() {
        return Err(Error::Rejected {
            message: reply.failure_message(),
        });
    }

    info!("Successfully attached {} file(s)", upload.files.len());
    let summary: UploadSummary = upload.summary();
    Ok((StatusCode::OK, Json(summary)).into_response())
}
