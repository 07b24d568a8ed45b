//! Remote storage through pre-authorized upload URLs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{UploadConfig, UploadMethod};
use crate::error::UploadError;
use crate::types::UploadTarget;

const MAX_ERROR_BODY: usize = 512;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Transfer `bytes` in one request and return the storage id.
    async fn upload(&self, target: &UploadTarget, bytes: &[u8]) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    storage_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    http: Client,
    method: UploadMethod,
}

impl HttpRemoteStore {
    pub fn new(settings: &UploadConfig) -> Result<Self, UploadError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            method: settings.method,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload(&self, target: &UploadTarget, bytes: &[u8]) -> Result<String, UploadError> {
        let request = match self.method {
            UploadMethod::Put => self.http.put(target.url().clone()),
            UploadMethod::Post => self.http.post(target.url().clone()),
        };
        debug!(target = %target.redacted(), bytes = bytes.len(), "uploading artifact");

        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UploadError::Status {
                status,
                body: truncate(&body),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::InvalidResponse(format!("{e}: {}", truncate(&body))))?;
        match parsed.storage_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(UploadError::InvalidResponse(truncate(&body))),
        }
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
