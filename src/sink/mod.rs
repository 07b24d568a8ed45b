//! Artifact persistence.
//!
//! [`SinkPlan::select`] decides once per request where bytes go;
//! [`ArtifactSink::persist_with`] carries the plan out.
//!
//! | Profile | Upload target | Plan |
//! |---|---|---|
//! | local | none | `LocalOnly` |
//! | local | some | `LocalAndRemote` (local best-effort, remote fatal) |
//! | serverless | some | `RemoteOnly` |
//! | serverless | none | rejected with `UploadTargetRequired` |

pub mod local;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::environment::EnvironmentProfile;
use crate::error::{PipelineError, ValidationError};
use crate::types::{StorageLocator, UploadTarget};

pub use local::LocalDiskSink;
pub use remote::{HttpRemoteStore, RemoteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkPlan {
    LocalOnly { dir: PathBuf },
    LocalAndRemote { dir: PathBuf, target: UploadTarget },
    RemoteOnly { target: UploadTarget },
}

impl SinkPlan {
    pub fn select(
        profile: &EnvironmentProfile,
        output_dir: &Path,
        target: Option<&UploadTarget>,
    ) -> Result<Self, ValidationError> {
        match (profile.is_read_only(), target) {
            (true, None) => Err(ValidationError::UploadTargetRequired),
            (true, Some(target)) => Ok(SinkPlan::RemoteOnly {
                target: target.clone(),
            }),
            (false, None) => Ok(SinkPlan::LocalOnly {
                dir: output_dir.to_path_buf(),
            }),
            (false, Some(target)) => Ok(SinkPlan::LocalAndRemote {
                dir: output_dir.to_path_buf(),
                target: target.clone(),
            }),
        }
    }

    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            SinkPlan::LocalOnly { dir } | SinkPlan::LocalAndRemote { dir, .. } => Some(dir),
            SinkPlan::RemoteOnly { .. } => None,
        }
    }

    pub fn upload_target(&self) -> Option<&UploadTarget> {
        match self {
            SinkPlan::LocalAndRemote { target, .. } | SinkPlan::RemoteOnly { target } => Some(target),
            SinkPlan::LocalOnly { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct ArtifactSink {
    remote: Arc<dyn RemoteStore>,
}

impl ArtifactSink {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Select a plan for `profile` and persist.
    pub async fn persist(
        &self,
        bytes: &[u8],
        filename: &str,
        profile: &EnvironmentProfile,
        output_dir: &Path,
        target: Option<&UploadTarget>,
    ) -> Result<Vec<StorageLocator>, PipelineError> {
        let plan = SinkPlan::select(profile, output_dir, target)?;
        self.persist_with(&plan, bytes, filename).await
    }

    /// Returns at least one locator or an error.
    pub async fn persist_with(
        &self,
        plan: &SinkPlan,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Vec<StorageLocator>, PipelineError> {
        let mut locators = Vec::with_capacity(2);

        if let Some(dir) = plan.local_dir() {
            match LocalDiskSink::new(dir).write(filename, bytes).await {
                Ok(path) => {
                    info!(path = %path.display(), "artifact saved locally");
                    locators.push(StorageLocator::Local { path });
                }
                Err(err) if plan.upload_target().is_some() => {
                    warn!(error = %err, "local save failed; continuing with upload");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(target) = plan.upload_target() {
            let storage_id = self.remote.upload(target, bytes).await?;
            info!(storage_id = %storage_id, target = %target.redacted(), "artifact uploaded");
            locators.push(StorageLocator::Remote { storage_id });
        }

        Ok(locators)
    }
}

impl std::fmt::Debug for ArtifactSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactSink").finish_non_exhaustive()
    }
}
