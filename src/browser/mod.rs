//! Headless browser provisioning.
//!
//! A [`Provisioner`] turns an [`EnvironmentProfile`] into a live
//! [`BrowserHandle`]: one browser process with one open page. The handle is
//! exclusively owned by a single pipeline run and must be given back through
//! [`BrowserHandle::release`].
//!
//! # Module Structure
//!
//! - [`provisioner`] - strategy selection and the chromium provisioner
//! - [`locate`] - well-known per-OS browser paths
//! - [`archive`] - pinned browser archive download and cache
//! - `chromium` - CDP-backed page driver
//! - [`mock`] - scripted driver with process accounting
//!
//! # Example
//!
//! ```no_run
//! use docpipe_lib::browser::{ChromiumProvisioner, Provisioner};
//! use docpipe_lib::config::Config;
//! use docpipe_lib::EnvironmentProfile;
//!
//! # async fn example() -> docpipe_lib::Result<()> {
//! let config = Config::default();
//! let provisioner = ChromiumProvisioner::new(config.browser.clone(), config.render.navigation_timeout);
//! let handle = provisioner.acquire(&EnvironmentProfile::detect()).await?;
//! handle.release().await;
//! # Ok(())
//! # }
//! ```

pub mod archive;
mod chromium;
pub mod locate;
pub mod mock;
pub mod provisioner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};
use url::Url;

use crate::environment::EnvironmentProfile;
use crate::error::{ProvisioningError, RenderError};
use crate::render::PdfLayout;

pub use provisioner::{launch_args, ChromiumProvisioner, ExecutableSource, LaunchPlan, SourceReport};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// How the browser executable was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStrategy {
    /// System install or explicitly configured binary.
    LocalBinary,
    /// Prebuilt binary materialized from a pinned archive.
    RemoteArchive,
    /// In-process scripted driver.
    Mock,
}

impl fmt::Display for ProvisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStrategy::LocalBinary => write!(f, "local-binary"),
            ProvisionStrategy::RemoteArchive => write!(f, "remote-archive"),
            ProvisionStrategy::Mock => write!(f, "mock"),
        }
    }
}

/// Operations on the single page owned by a browser session.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait until no requests have been in flight for `quiet_window`.
    async fn navigate(&mut self, url: &Url, quiet_window: Duration) -> Result<(), RenderError>;

    async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, RenderError>;

    /// Terminate the browser process and release its resources.
    async fn shutdown(&mut self) -> std::io::Result<()>;
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn acquire(&self, profile: &EnvironmentProfile) -> Result<BrowserHandle, ProvisioningError>;
}

/// Exclusively owned browser session.
///
/// Dropping a handle without calling [`release`](Self::release) still tears
/// the process down through the driver's own drop, but is logged.
pub struct BrowserHandle {
    session: u64,
    strategy: ProvisionStrategy,
    driver: Box<dyn PageDriver>,
    permit: Option<OwnedSemaphorePermit>,
    released: bool,
}

impl BrowserHandle {
    pub fn new(strategy: ProvisionStrategy, driver: Box<dyn PageDriver>) -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            strategy,
            driver,
            permit: None,
            released: false,
        }
    }

    /// Hold a session-limiter permit until the handle is gone.
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn strategy(&self) -> ProvisionStrategy {
        self.strategy
    }

    pub async fn navigate(&mut self, url: &Url, quiet_window: Duration) -> Result<(), RenderError> {
        self.driver.navigate(url, quiet_window).await
    }

    pub async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, RenderError> {
        self.driver.print_pdf(layout).await
    }

    /// Terminate the browser. Shutdown errors are logged; the process is
    /// killed on drop regardless.
    pub async fn release(mut self) {
        if let Err(err) = self.driver.shutdown().await {
            warn!(session = self.session, error = %err, "browser shutdown reported an error");
        }
        self.released = true;
        self.permit.take();
        debug!(session = self.session, strategy = %self.strategy, "browser released");
    }
}

impl fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserHandle")
            .field("session", &self.session)
            .field("strategy", &self.strategy)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                session = self.session,
                "browser handle dropped without release; process is killed on drop"
            );
        }
    }
}
