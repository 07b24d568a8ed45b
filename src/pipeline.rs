//! Request orchestration.
//!
//! One [`Orchestrator::run`] call drives a single request through
//! `Idle → Provisioning → Rendering → Persisting → Done`, or to `Failed`
//! from any active stage. Everything that can be rejected without a browser
//! is checked in `Idle`. The browser handle is released at one site, after
//! rendering and persistence and before the terminal stage is reported.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserHandle, Provisioner};
use crate::config::Config;
use crate::environment::EnvironmentProfile;
use crate::error::{ConfigError, Result};
use crate::render::PageRenderer;
use crate::sink::{ArtifactSink, HttpRemoteStore, RemoteStore, SinkPlan};
use crate::types::{artifact_filename, RenderRequest, RenderedArtifact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Provisioning,
    Rendering,
    Persisting,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle, Provisioning)
                | (Provisioning, Rendering)
                | (Rendering, Persisting)
                | (Persisting, Done)
                | (Idle | Provisioning | Rendering | Persisting, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Provisioning => "provisioning",
            PipelineStage::Rendering => "rendering",
            PipelineStage::Persisting => "persisting",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub artifact: RenderedArtifact,
    pub source_url: Url,
    pub elapsed: Duration,
}

struct StageTracker<'a> {
    stage: PipelineStage,
    request: &'a RenderRequest,
    started: Instant,
}

impl<'a> StageTracker<'a> {
    fn new(request: &'a RenderRequest) -> Self {
        Self {
            stage: PipelineStage::Idle,
            request,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        debug!(
            document_kind = %self.request.kind(),
            document_id = self.request.document_id(),
            from = %self.stage,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "pipeline stage"
        );
        self.stage = next;
    }
}

pub struct Orchestrator {
    provisioner: Arc<dyn Provisioner>,
    renderer: PageRenderer,
    sink: ArtifactSink,
    base_url: Url,
    page_path: String,
    output_dir: PathBuf,
    navigation_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        renderer: PageRenderer,
        sink: ArtifactSink,
        base_url: Url,
        page_path: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            provisioner,
            renderer,
            sink,
            base_url,
            page_path: page_path.into(),
            output_dir: output_dir.into(),
            navigation_timeout,
        }
    }

    /// Wire an orchestrator from configuration with the HTTP remote store.
    pub fn from_config(config: &Config, provisioner: Arc<dyn Provisioner>) -> std::result::Result<Self, ConfigError> {
        let remote = HttpRemoteStore::new(&config.upload)
            .map_err(|e| ConfigError::Invalid(format!("failed to build upload client: {e}")))?;
        Self::with_remote(config, provisioner, Arc::new(remote))
    }

    pub fn with_remote(
        config: &Config,
        provisioner: Arc<dyn Provisioner>,
        remote: Arc<dyn RemoteStore>,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(
            provisioner,
            PageRenderer::new(&config.render),
            ArtifactSink::new(remote),
            config.base_url()?,
            config.documents.page_path.clone(),
            config.documents.output_dir.clone(),
            config.render.navigation_timeout,
        ))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn run(&self, request: &RenderRequest, profile: &EnvironmentProfile) -> Result<RenderOutcome> {
        let mut stages = StageTracker::new(request);
        let result = self.execute(request, profile, &mut stages).await;

        match &result {
            Ok(outcome) => {
                stages.advance(PipelineStage::Done);
                info!(
                    document_kind = %request.kind(),
                    document_id = request.document_id(),
                    filename = %outcome.artifact.filename,
                    locators = outcome.artifact.locators.len(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "document generated"
                );
            }
            Err(err) => {
                stages.advance(PipelineStage::Failed);
                warn!(
                    document_kind = %request.kind(),
                    document_id = request.document_id(),
                    stage = %err.stage(),
                    error = %err,
                    "document generation failed"
                );
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &RenderRequest,
        profile: &EnvironmentProfile,
        stages: &mut StageTracker<'_>,
    ) -> Result<RenderOutcome> {
        let plan = SinkPlan::select(profile, &self.output_dir, request.upload_target())?;
        let source_url = request.resolve_source_url(&self.base_url, &self.page_path)?;

        stages.advance(PipelineStage::Provisioning);
        let mut browser = self.provisioner.acquire(profile).await?;

        let captured = self
            .capture_and_persist(&mut browser, request, &source_url, &plan, stages)
            .await;
        browser.release().await;
        let artifact = captured?;

        Ok(RenderOutcome {
            artifact,
            source_url,
            elapsed: stages.started.elapsed(),
        })
    }

    async fn capture_and_persist(
        &self,
        browser: &mut BrowserHandle,
        request: &RenderRequest,
        source_url: &Url,
        plan: &SinkPlan,
        stages: &mut StageTracker<'_>,
    ) -> Result<RenderedArtifact> {
        stages.advance(PipelineStage::Rendering);
        let bytes = self
            .renderer
            .render(browser, source_url, self.navigation_timeout)
            .await?;

        stages.advance(PipelineStage::Persisting);
        let generated_at = Utc::now();
        let filename = artifact_filename(request.kind(), request.document_id(), generated_at);
        let locators = self.sink.persist_with(plan, &bytes, &filename).await?;

        Ok(RenderedArtifact {
            filename,
            bytes,
            generated_at,
            locators,
        })
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("base_url", &self.base_url.as_str())
            .field("page_path", &self.page_path)
            .field("output_dir", &self.output_dir)
            .field("navigation_timeout", &self.navigation_timeout)
            .finish_non_exhaustive()
    }
}
