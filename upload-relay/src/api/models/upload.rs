//! Request and response models for the upload endpoint.

use crate::crm::{DealUpdatePayload, FileTuple, is_truthy};
use crate::errors::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Upload request exactly as received.
///
/// Every field is kept as raw JSON: browser clients send whatever their form state holds, and
/// presence is judged by truthiness rather than by type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub files: Value,
    #[serde(default)]
    pub deal_id: Value,
    #[serde(default)]
    pub webhook: Value,
    #[serde(default)]
    pub file_field: Value,
}

/// `Some` for any value that is present, `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// One uploaded file.
///
/// Nothing about an entry is checked: fields are relayed and echoed as sent. An absent field
/// (`None`) is distinct from an explicit `null`, since only the latter shows up in the echo.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileEntry {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    /// Data URI or bare base64; passed through untouched
    #[serde(default, deserialize_with = "present")]
    pub data: Option<Value>,
    /// Informational only, echoed back to the client
    #[serde(default, deserialize_with = "present")]
    pub size: Option<Value>,
}

impl FileEntry {
    /// Entries that are not objects have no fields.
    fn from_value(entry: Value) -> Self {
        match entry {
            entry @ Value::Object(_) => serde_json::from_value(entry).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// An upload request that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    pub files: Vec<FileEntry>,
    pub deal_id: Value,
    pub webhook: String,
    pub file_field: String,
}

/// String form of a truthy scalar, as it would read when interpolated into a URL or used as a key.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl UploadRequest {
    /// Parse a request body. JSON that is not an object carries no fields.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        match serde_json::from_slice::<Value>(body)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            _ => Ok(Self::default()),
        }
    }

    /// Check required fields in order, stopping at the first failure.
    pub fn validate(self) -> Result<ValidatedUpload, Error> {
        let entries = match self.files {
            Value::Array(entries) if !entries.is_empty() => entries,
            _ => return Err(Error::bad_request("No files provided")),
        };

        if !is_truthy(&self.deal_id) {
            return Err(Error::bad_request("No deal ID provided"));
        }

        if !is_truthy(&self.webhook) || !is_truthy(&self.file_field) {
            return Err(Error::bad_request("Missing configuration"));
        }

        Ok(ValidatedUpload {
            files: entries.into_iter().map(FileEntry::from_value).collect(),
            deal_id: self.deal_id,
            webhook: as_text(&self.webhook),
            file_field: as_text(&self.file_field),
        })
    }
}

impl ValidatedUpload {
    /// Build the CRM update, keeping file order. Missing names or data go out as `null`.
    pub fn to_payload(&self) -> DealUpdatePayload {
        let tuples: Vec<FileTuple> = self
            .files
            .iter()
            .map(|f| (f.name.clone().unwrap_or_default(), f.data.clone().unwrap_or_default()))
            .collect();
        DealUpdatePayload::new(self.deal_id.clone(), self.file_field.clone(), tuples)
    }

    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            success: true,
            uploaded: self.files.len(),
            files: self
                .files
                .iter()
                .map(|f| FileEcho {
                    name: f.name.clone(),
                    size: f.size.clone(),
                })
                .collect(),
        }
    }
}

/// Successful upload response. Echoes the request's files, not the CRM's view of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub success: bool,
    pub uploaded: usize,
    pub files: Vec<FileEcho>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEcho {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
}
