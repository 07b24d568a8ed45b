use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::browser::SourceReport;
use crate::environment::{EnvironmentProfile, ExecutionMode};
use crate::error::{ErrorPayload, PipelineError};
use crate::pipeline::{PipelineStage, RenderOutcome};
use crate::types::DocumentKind;

/// Schema version for CLI output payloads.
pub const DOCPIPE_OUTPUT_VERSION: &str = "0.1.0";

/// HTTP success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    /// Page that was rendered.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
}

impl RenderResponse {
    pub fn from_outcome(outcome: &RenderOutcome) -> Self {
        let artifact = &outcome.artifact;
        let filepath = artifact.local_path().map(PathBuf::from);
        let storage_id = artifact.storage_id().map(str::to_string);
        let message = match (&filepath, &storage_id) {
            (Some(_), Some(_)) => "PDF generated, saved locally and uploaded",
            (None, Some(_)) => "PDF generated and uploaded",
            _ => "PDF generated and saved locally",
        };
        Self {
            success: true,
            message: message.to_string(),
            filename: artifact.filename.clone(),
            url: outcome.source_url.to_string(),
            filepath,
            storage_id,
        }
    }
}

/// HTTP failure body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub error: String,
    pub message: String,
    pub platform: String,
    pub is_vercel: bool,
    pub is_production: bool,
}

impl FailureResponse {
    pub fn new(err: &PipelineError, profile: &EnvironmentProfile) -> Self {
        Self {
            error: err.headline().to_string(),
            message: err.to_string(),
            platform: profile.os.to_string(),
            is_vercel: profile.is_vercel,
            is_production: profile.is_production,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: ExecutionMode,
    pub platform: String,
}

impl HealthResponse {
    pub fn ok(profile: &EnvironmentProfile) -> Self {
        Self {
            status: "ok".to_string(),
            mode: profile.mode,
            platform: profile.os.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DocpipeOutput {
    Render(RenderOutput),
    Doctor(DoctorOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub version: String,
    pub document_kind: DocumentKind,
    pub document_id: String,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub response: RenderResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorOutput {
    pub version: String,
    pub environment: EnvironmentProfile,
    pub executable: SourceReport,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_sessions: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    pub error: ErrorPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentProfile>,
}

impl ErrorOutput {
    pub fn new(error: ErrorPayload) -> Self {
        Self {
            version: DOCPIPE_OUTPUT_VERSION.to_string(),
            stage: None,
            error,
            environment: None,
        }
    }

    pub fn from_pipeline(err: &PipelineError, profile: &EnvironmentProfile) -> Self {
        Self {
            version: DOCPIPE_OUTPUT_VERSION.to_string(),
            stage: Some(err.stage()),
            error: err.to_payload(),
            environment: Some(*profile),
        }
    }
}
