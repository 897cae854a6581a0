//! Outbound calls to the CRM's REST webhook.
//!
//! The relay performs exactly one call per upload: a deal update that attaches the uploaded files
//! to a file-typed user field. The wire shapes here are what the CRM expects and returns:
//!
//! ```json
//! { "id": "42", "fields": { "UF_FILES": [["a.pdf", "<base64>"]] } }
//! ```
//!
//! Replies carry a `result` field on success, and `error` / `error_description` otherwise. The
//! CRM reports rejections with a 4xx status *and* a JSON body, so replies are decoded regardless
//! of status.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error as ThisError;

pub use client::ReqwestDealUpdater;

/// Message used when the CRM rejects an update without describing why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Upload failed";

/// A file attachment in the CRM's positional `[name, data]` form.
pub type FileTuple = (Value, Value);

/// Body of a deal update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealUpdatePayload {
    /// Deal identifier, forwarded exactly as the client sent it
    pub id: Value,
    /// Keyed by the target field name, which is only known at request time
    pub fields: HashMap<String, Vec<FileTuple>>,
}

impl DealUpdatePayload {
    pub fn new(id: Value, field: impl Into<String>, files: Vec<FileTuple>) -> Self {
        Self {
            id,
            fields: HashMap::from([(field.into(), files)]),
        }
    }
}

/// Decoded CRM reply. Fields are untyped so that any JSON object decodes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealUpdateReply {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub error_description: Value,
}

impl DealUpdateReply {
    pub fn is_success(&self) -> bool {
        is_truthy(&self.result)
    }

    pub fn failure_message(&self) -> String {
        match self.error_description.as_str() {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

#[derive(ThisError, Debug)]
pub enum CrmError {
    /// Connection, TLS, timeout or other transport failure
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The CRM answered, but not with JSON
    #[error("Invalid JSON in CRM response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Performs the deal update call.
///
/// In practice this is [`ReqwestDealUpdater`]; tests substitute their own implementations to
/// observe how many calls are made.
#[async_trait]
pub trait DealUpdater: Send + Sync {
    /// Send `payload` to `webhook`. Implementations make a single attempt.
    async fn update_deal(&self, webhook: &str, payload: &DealUpdatePayload) -> Result<DealUpdateReply, CrmError>;
}

/// JavaScript-style truthiness, which is how the CRM and its browser clients signal presence.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
