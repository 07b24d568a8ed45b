use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::ProvisionStrategy;
use crate::environment::OsFamily;
use crate::pipeline::PipelineStage;

/// Rejections raised before any browser is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required query parameter `type` (expected quote or invoice)")]
    MissingKind,

    #[error("unsupported document type {0:?} (expected quote or invoice)")]
    UnknownKind(String),

    #[error("document id must not be empty")]
    EmptyDocumentId,

    #[error("invalid source url {value:?}: {reason}")]
    InvalidSourceUrl { value: String, reason: String },

    #[error("invalid upload url {value:?}: {reason}")]
    InvalidUploadUrl { value: String, reason: String },

    #[error("upload target required: uploadUrl must be provided when running in a read-only serverless environment")]
    UploadTargetRequired,
}

impl ValidationError {
    /// Request-shape problems are the caller's fault; the upload requirement
    /// depends on where the pipeline runs and is reported as a server failure.
    pub fn is_request_shape(&self) -> bool {
        !matches!(self, ValidationError::UploadTargetRequired)
    }
}

#[derive(Debug, Error)]
pub enum ProvisioningFailure {
    #[error("browser not found on {os}; searched: {}", format_paths(searched))]
    BrowserNotFound { os: OsFamily, searched: Vec<PathBuf> },

    #[error("no browser archive configured; set [browser].archive_url or DOCPIPE_BROWSER_ARCHIVE_URL")]
    ArchiveNotConfigured,

    #[error("failed to fetch browser archive {url}: {message}")]
    ArchiveFetch { url: String, message: String },

    #[error("failed to unpack browser archive: {0}")]
    ArchiveUnpack(String),

    #[error("archive does not contain executable {0}")]
    ArchiveMissingExecutable(PathBuf),

    #[error("failed to launch browser {executable}: {message}")]
    Launch { executable: PathBuf, message: String },

    #[error("browser session limit of {limit} reached")]
    Unavailable { limit: usize },
}

/// Browser could not be made ready. Never retried automatically.
#[derive(Debug, Error)]
#[error("browser provisioning failed ({strategy}): {failure}")]
pub struct ProvisioningError {
    pub strategy: ProvisionStrategy,
    #[source]
    pub failure: ProvisioningFailure,
}

impl ProvisioningError {
    pub fn new(strategy: ProvisionStrategy, failure: ProvisioningFailure) -> Self {
        Self { strategy, failure }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("navigation to {url} did not reach network quiescence within {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("PDF capture failed: {0}")]
    Capture(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload transfer failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload rejected with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("upload response did not contain a storageId: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct LocalPersistError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    LocalPersist(#[from] LocalPersistError),
}

impl PipelineError {
    /// Stage the failure is attributed to.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Validation(_) => PipelineStage::Idle,
            PipelineError::Provisioning(_) => PipelineStage::Provisioning,
            PipelineError::Render(_) => PipelineStage::Rendering,
            PipelineError::Upload(_) | PipelineError::LocalPersist(_) => PipelineStage::Persisting,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Validation(_) => ErrorCategory::Validation,
            PipelineError::Provisioning(_) => ErrorCategory::Provisioning,
            PipelineError::Render(_) => ErrorCategory::Render,
            PipelineError::Upload(_) => ErrorCategory::Upload,
            PipelineError::LocalPersist(_) => ErrorCategory::LocalPersist,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::Validation(err) if err.is_request_shape() => 400,
            _ => 500,
        }
    }

    /// Short headline used as the `error` field of failure responses.
    pub fn headline(&self) -> &'static str {
        match self {
            PipelineError::Validation(ValidationError::UploadTargetRequired) => {
                "Upload target required"
            }
            PipelineError::Validation(_) => "Invalid request",
            PipelineError::Provisioning(_) => "Browser provisioning failed",
            PipelineError::Render(_) => "PDF rendering failed",
            PipelineError::Upload(_) => "PDF upload failed",
            PipelineError::LocalPersist(_) => "PDF save failed",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            PipelineError::Validation(ValidationError::UploadTargetRequired) => {
                "Pass uploadUrl (a pre-authorized storage upload URL); local disk is read-only here."
            }
            PipelineError::Validation(_) => {
                "Check the type/id/url/uploadUrl parameters (type must be quote or invoice)."
            }
            PipelineError::Provisioning(err) => match err.failure {
                ProvisioningFailure::BrowserNotFound { .. } => {
                    "Install Google Chrome or Chromium, or set DOCPIPE_CHROME_PATH / [browser].executable."
                }
                ProvisioningFailure::ArchiveNotConfigured
                | ProvisioningFailure::ArchiveFetch { .. }
                | ProvisioningFailure::ArchiveUnpack(_)
                | ProvisioningFailure::ArchiveMissingExecutable(_) => {
                    "Check DOCPIPE_BROWSER_ARCHIVE_URL and [browser].archive_executable; the cache dir must be writable."
                }
                ProvisioningFailure::Unavailable { .. } => {
                    "All browser sessions are busy; retry shortly or raise [browser].max_concurrent_sessions."
                }
                _ => "Check the browser binary and launch flags; run `docpipe doctor` for diagnostics.",
            },
            PipelineError::Render(RenderError::Timeout { .. }) => {
                "The page kept the network busy; raise [render].navigation_timeout or fix the page's long-running requests."
            }
            PipelineError::Render(_) => {
                "Verify the page URL is reachable from this host and serves the printable document."
            }
            PipelineError::Upload(_) => {
                "Upload URLs are single-use and short-lived; request a fresh uploadUrl and retry."
            }
            PipelineError::LocalPersist(_) => {
                "Check that [documents].output_dir is writable."
            }
        };
        ErrorPayload::new(self.category(), self.to_string(), remediation)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Validation,
    Provisioning,
    Render,
    Upload,
    LocalPersist,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(no candidates for this platform)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
