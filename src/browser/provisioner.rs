//! Chromium provisioning for local and serverless hosts.
//!
//! The provisioner picks an [`ExecutableSource`] from the environment
//! profile, resolves it to a binary on disk, and launches one browser per
//! acquired handle. An optional session cap is enforced with a semaphore
//! whose permit is carried by the handle; requests over the cap fail
//! instead of waiting for another request's browser to finish.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use url::Url;

use super::archive::ArchiveCache;
use super::chromium::ChromiumPage;
use super::locate;
use super::{BrowserHandle, ProvisionStrategy, Provisioner};
use crate::config::BrowserConfig;
use crate::environment::{EnvironmentProfile, ExecutionMode, OsFamily};
use crate::error::{ProvisioningError, ProvisioningFailure};
use crate::Viewport;

/// Flags for constrained serverless sandboxes.
const HARDENED_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--no-zygote",
    "--single-process",
    "--hide-scrollbars",
    "--mute-audio",
    "--disable-extensions",
    "--no-first-run",
];

const LOCAL_ARGS: &[&str] = &["--hide-scrollbars", "--no-first-run"];

/// Extra command-line flags for a profile. The sandbox switch is applied
/// separately by [`LaunchPlan::hardened`].
pub fn launch_args(profile: &EnvironmentProfile) -> Vec<&'static str> {
    match profile.mode {
        ExecutionMode::ServerlessReadonly => HARDENED_ARGS.to_vec(),
        ExecutionMode::InteractiveLocal => LOCAL_ARGS.to_vec(),
    }
}

/// Where the browser binary comes from.
#[derive(Debug, Clone)]
pub enum ExecutableSource {
    /// Configured path, used as-is.
    Explicit(PathBuf),
    /// First hit among the well-known install paths.
    SystemSearch { os: OsFamily, candidates: Vec<PathBuf> },
    /// Pinned archive; `None` when no archive URL is configured.
    RemoteArchive(Option<ArchiveCache>),
    /// Archive URL is configured but does not parse.
    MalformedArchive { url: String, message: String },
}

impl ExecutableSource {
    pub fn strategy(&self) -> ProvisionStrategy {
        match self {
            ExecutableSource::Explicit(_) | ExecutableSource::SystemSearch { .. } => {
                ProvisionStrategy::LocalBinary
            }
            ExecutableSource::RemoteArchive(_) | ExecutableSource::MalformedArchive { .. } => {
                ProvisionStrategy::RemoteArchive
            }
        }
    }

    pub async fn resolve(&self) -> Result<PathBuf, ProvisioningError> {
        let fail = |failure| ProvisioningError::new(self.strategy(), failure);
        match self {
            ExecutableSource::Explicit(path) => Ok(path.clone()),
            ExecutableSource::SystemSearch { os, candidates } => locate::first_existing(candidates)
                .ok_or_else(|| {
                    fail(ProvisioningFailure::BrowserNotFound {
                        os: *os,
                        searched: candidates.clone(),
                    })
                }),
            ExecutableSource::RemoteArchive(None) => Err(fail(ProvisioningFailure::ArchiveNotConfigured)),
            ExecutableSource::RemoteArchive(Some(archive)) => archive.ensure().await.map_err(fail),
            ExecutableSource::MalformedArchive { url, message } => {
                Err(fail(ProvisioningFailure::ArchiveFetch {
                    url: url.clone(),
                    message: message.clone(),
                }))
            }
        }
    }

    /// Non-mutating description for diagnostics. Never downloads.
    pub fn diagnose(&self) -> SourceReport {
        let (kind, resolved, candidates, archive_url, materialized) = match self {
            ExecutableSource::Explicit(path) => {
                ("explicit", Some(path.clone()), Vec::new(), None, path.is_file())
            }
            ExecutableSource::SystemSearch { candidates, .. } => {
                let hit = locate::first_existing(candidates);
                let found = hit.is_some();
                ("system-search", hit, candidates.clone(), None, found)
            }
            ExecutableSource::RemoteArchive(None) => ("remote-archive", None, Vec::new(), None, false),
            ExecutableSource::RemoteArchive(Some(archive)) => (
                "remote-archive",
                Some(archive.executable_path()),
                Vec::new(),
                Some(archive.url().to_string()),
                archive.is_materialized(),
            ),
            ExecutableSource::MalformedArchive { url, .. } => {
                ("remote-archive", None, Vec::new(), Some(url.clone()), false)
            }
        };
        SourceReport {
            strategy: self.strategy(),
            kind,
            resolved,
            candidates,
            archive_url,
            materialized,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub strategy: ProvisionStrategy,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    /// Whether the executable is already present on disk.
    pub materialized: bool,
}

/// Everything needed to start one browser process.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub executable: PathBuf,
    /// Disable the sandbox and apply [`HARDENED_ARGS`].
    pub hardened: bool,
    pub viewport: Viewport,
    pub launch_timeout: Duration,
    /// Upper bound for individual CDP requests.
    pub request_timeout: Duration,
    pub args: Vec<&'static str>,
}

impl LaunchPlan {
    pub fn new(executable: PathBuf, profile: &EnvironmentProfile, settings: &BrowserConfig, request_timeout: Duration) -> Self {
        Self {
            executable,
            hardened: profile.is_read_only(),
            viewport: settings.viewport,
            launch_timeout: settings.launch_timeout,
            request_timeout,
            args: launch_args(profile),
        }
    }
}

/// Launches real Chromium processes.
#[derive(Debug, Clone)]
pub struct ChromiumProvisioner {
    settings: BrowserConfig,
    request_timeout: Duration,
    http: reqwest::Client,
    sessions: Option<SessionLimit>,
}

#[derive(Debug, Clone)]
struct SessionLimit {
    limit: usize,
    semaphore: Arc<Semaphore>,
}

impl ChromiumProvisioner {
    pub fn new(settings: BrowserConfig, request_timeout: Duration) -> Self {
        let sessions = settings.max_concurrent_sessions.map(|limit| {
            let limit = limit.max(1);
            SessionLimit {
                limit,
                semaphore: Arc::new(Semaphore::new(limit)),
            }
        });
        Self {
            settings,
            request_timeout,
            http: reqwest::Client::new(),
            sessions,
        }
    }

    /// Take a session slot without waiting. `None` when uncapped.
    fn session_permit(&self, strategy: ProvisionStrategy) -> Result<Option<OwnedSemaphorePermit>, ProvisioningError> {
        let Some(sessions) = &self.sessions else {
            return Ok(None);
        };
        sessions
            .semaphore
            .clone()
            .try_acquire_owned()
            .map(Some)
            .map_err(|_| {
                ProvisioningError::new(
                    strategy,
                    ProvisioningFailure::Unavailable {
                        limit: sessions.limit,
                    },
                )
            })
    }

    pub fn settings(&self) -> &BrowserConfig {
        &self.settings
    }

    /// Explicit executable wins; otherwise serverless hosts use the archive
    /// and local hosts search well-known paths.
    pub fn source_for(&self, profile: &EnvironmentProfile) -> ExecutableSource {
        if let Some(path) = &self.settings.executable {
            return ExecutableSource::Explicit(path.clone());
        }
        match profile.mode {
            ExecutionMode::InteractiveLocal => ExecutableSource::SystemSearch {
                os: profile.os,
                candidates: locate::well_known_paths(profile.os),
            },
            ExecutionMode::ServerlessReadonly => {
                let Some(raw) = self.settings.archive_url.as_deref() else {
                    return ExecutableSource::RemoteArchive(None);
                };
                match Url::parse(raw) {
                    Ok(url) => ExecutableSource::RemoteArchive(Some(ArchiveCache::new(
                        url,
                        self.settings.cache_dir.clone(),
                        self.settings.archive_executable.clone(),
                        self.http.clone(),
                    ))),
                    Err(err) => ExecutableSource::MalformedArchive {
                        url: raw.to_string(),
                        message: err.to_string(),
                    },
                }
            }
        }
    }
}

#[async_trait]
impl Provisioner for ChromiumProvisioner {
    async fn acquire(&self, profile: &EnvironmentProfile) -> Result<BrowserHandle, ProvisioningError> {
        let source = self.source_for(profile);
        let strategy = source.strategy();

        let permit = self.session_permit(strategy)?;

        let executable = source.resolve().await?;
        debug!(strategy = %strategy, executable = %executable.display(), "resolved browser executable");

        let plan = LaunchPlan::new(executable, profile, &self.settings, self.request_timeout);
        let page = ChromiumPage::launch(&plan)
            .await
            .map_err(|failure| ProvisioningError::new(strategy, failure))?;

        let mut handle = BrowserHandle::new(strategy, Box::new(page));
        if let Some(permit) = permit {
            handle = handle.with_permit(permit);
        }
        info!(
            session = handle.session(),
            strategy = %strategy,
            hardened = plan.hardened,
            "browser launched"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioner(settings: BrowserConfig) -> ChromiumProvisioner {
        ChromiumProvisioner::new(settings, Duration::from_secs(5))
    }

    fn available(p: &ChromiumProvisioner) -> Option<usize> {
        p.sessions.as_ref().map(|s| s.semaphore.available_permits())
    }

    #[test]
    fn sessions_are_uncapped_by_default() {
        let p = provisioner(BrowserConfig::default());
        assert!(p.sessions.is_none());
        for _ in 0..16 {
            assert!(p.session_permit(ProvisionStrategy::LocalBinary).unwrap().is_none());
        }
    }

    #[test]
    fn capped_sessions_fail_fast_when_exhausted() {
        let p = provisioner(BrowserConfig {
            max_concurrent_sessions: Some(0),
            ..BrowserConfig::default()
        });
        assert_eq!(available(&p), Some(1));

        let held = p.session_permit(ProvisionStrategy::LocalBinary).unwrap();
        assert!(held.is_some());
        let err = p.session_permit(ProvisionStrategy::LocalBinary).unwrap_err();
        assert!(matches!(err.failure, ProvisioningFailure::Unavailable { limit: 1 }));

        drop(held);
        assert!(p.session_permit(ProvisionStrategy::LocalBinary).unwrap().is_some());
    }

    #[test]
    fn local_profile_searches_well_known_paths() {
        let p = provisioner(BrowserConfig::default());
        let source = p.source_for(&EnvironmentProfile::local(OsFamily::Linux));
        match &source {
            ExecutableSource::SystemSearch { os, candidates } => {
                assert_eq!(*os, OsFamily::Linux);
                assert_eq!(candidates, &locate::well_known_paths(OsFamily::Linux));
            }
            other => panic!("expected system search, got {other:?}"),
        }
        assert_eq!(source.strategy(), ProvisionStrategy::LocalBinary);
    }

    #[test]
    fn serverless_profile_uses_archive() {
        let p = provisioner(BrowserConfig {
            archive_url: Some("https://cdn.example.com/chromium-131.tar.gz".into()),
            ..BrowserConfig::default()
        });
        let source = p.source_for(&EnvironmentProfile::serverless(OsFamily::Linux));
        assert_eq!(source.strategy(), ProvisionStrategy::RemoteArchive);
        let report = source.diagnose();
        assert_eq!(report.kind, "remote-archive");
        assert_eq!(
            report.archive_url.as_deref(),
            Some("https://cdn.example.com/chromium-131.tar.gz")
        );
    }

    #[test]
    fn explicit_executable_wins_in_every_mode() {
        let p = provisioner(BrowserConfig {
            executable: Some(PathBuf::from("/opt/chrome/chrome")),
            archive_url: Some("https://cdn.example.com/chromium.tar".into()),
            ..BrowserConfig::default()
        });
        for profile in [
            EnvironmentProfile::local(OsFamily::Macos),
            EnvironmentProfile::serverless(OsFamily::Linux),
        ] {
            assert!(matches!(p.source_for(&profile), ExecutableSource::Explicit(_)));
        }
    }

    #[test]
    fn hardened_flags_only_for_serverless() {
        let serverless = launch_args(&EnvironmentProfile::serverless(OsFamily::Linux));
        assert!(serverless.contains(&"--disable-gpu"));
        assert!(serverless.contains(&"--single-process"));

        let local = launch_args(&EnvironmentProfile::local(OsFamily::Linux));
        assert!(!local.contains(&"--disable-gpu"));

        let plan = LaunchPlan::new(
            PathBuf::from("/x/chromium"),
            &EnvironmentProfile::serverless(OsFamily::Linux),
            &BrowserConfig::default(),
            Duration::from_secs(3),
        );
        assert!(plan.hardened);
        assert_eq!(plan.viewport, Viewport::default());
    }

    #[tokio::test]
    async fn missing_browser_lists_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("chrome"), dir.path().join("chromium")];
        let source = ExecutableSource::SystemSearch {
            os: OsFamily::Linux,
            candidates: candidates.clone(),
        };
        let err = source.resolve().await.unwrap_err();
        assert_eq!(err.strategy, ProvisionStrategy::LocalBinary);
        let msg = err.to_string();
        for candidate in &candidates {
            assert!(msg.contains(&candidate.display().to_string()), "got: {msg}");
        }
    }

    #[tokio::test]
    async fn serverless_without_archive_fails_before_launch() {
        let p = provisioner(BrowserConfig::default());
        let err = p
            .acquire(&EnvironmentProfile::serverless(OsFamily::Linux))
            .await
            .unwrap_err();
        assert!(matches!(err.failure, ProvisioningFailure::ArchiveNotConfigured));
        assert_eq!(err.strategy, ProvisionStrategy::RemoteArchive);
    }

    #[tokio::test]
    async fn unparseable_archive_url_reports_the_parse_error() {
        let p = provisioner(BrowserConfig {
            archive_url: Some("not a url".into()),
            ..BrowserConfig::default()
        });
        let profile = EnvironmentProfile::serverless(OsFamily::Linux);
        assert_eq!(p.source_for(&profile).diagnose().archive_url.as_deref(), Some("not a url"));

        let err = p.acquire(&profile).await.unwrap_err();
        assert_eq!(err.strategy, ProvisionStrategy::RemoteArchive);
        match err.failure {
            ProvisioningFailure::ArchiveFetch { url, message } => {
                assert_eq!(url, "not a url");
                assert!(message.contains("relative URL"), "got: {message}");
            }
            other => panic!("expected archive fetch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_resolve_returns_the_session_slot() {
        let p = provisioner(BrowserConfig {
            max_concurrent_sessions: Some(2),
            ..BrowserConfig::default()
        });
        p.acquire(&EnvironmentProfile::serverless(OsFamily::Linux))
            .await
            .unwrap_err();
        assert_eq!(available(&p), Some(2));
    }

    /// An "executable" that never prints a DevTools endpoint.
    #[cfg(unix)]
    fn silent_browser(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("silent-chrome");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_acquires_do_not_wait_on_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(provisioner(BrowserConfig {
            executable: Some(silent_browser(dir.path())),
            launch_timeout: Duration::from_secs(1),
            ..BrowserConfig::default()
        }));
        let profile = EnvironmentProfile::local(OsFamily::Linux);

        let started = std::time::Instant::now();
        let a = tokio::spawn({
            let p = Arc::clone(&p);
            async move { p.acquire(&profile).await.map(|_| ()) }
        });
        let b = tokio::spawn({
            let p = Arc::clone(&p);
            async move { p.acquire(&profile).await.map(|_| ()) }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert!(matches!(a.unwrap_err().failure, ProvisioningFailure::Launch { .. }));
        assert!(matches!(b.unwrap_err().failure, ProvisioningFailure::Launch { .. }));
        // Serialized launches would take two full launch timeouts.
        assert!(started.elapsed() < Duration::from_millis(1900), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn request_over_cap_fails_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(provisioner(BrowserConfig {
            executable: Some(silent_browser(dir.path())),
            launch_timeout: Duration::from_secs(1),
            max_concurrent_sessions: Some(1),
            ..BrowserConfig::default()
        }));
        let profile = EnvironmentProfile::local(OsFamily::Linux);

        let slow = tokio::spawn({
            let p = Arc::clone(&p);
            async move { p.acquire(&profile).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let err = p.acquire(&profile).await.unwrap_err();
        assert!(matches!(err.failure, ProvisioningFailure::Unavailable { limit: 1 }));
        assert!(started.elapsed() < Duration::from_millis(300));

        assert!(slow.await.unwrap().is_err());
        assert_eq!(available(&p), Some(1));
    }

    #[test]
    fn system_search_report_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let chrome = dir.path().join("chrome");
        std::fs::write(&chrome, b"").unwrap();
        let source = ExecutableSource::SystemSearch {
            os: OsFamily::Linux,
            candidates: vec![dir.path().join("missing"), chrome.clone()],
        };
        let report = source.diagnose();
        assert_eq!(report.resolved, Some(chrome));
        assert!(report.materialized);
        assert_eq!(report.candidates.len(), 2);
    }
}
