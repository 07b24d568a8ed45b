//! Scripted provisioner that never starts a real browser.
//!
//! Used by `DOCPIPE_MOCK_PDF` and the test suites. Every launched page is
//! counted in a [`ProcessLedger`] so callers can check that no session is
//! left running after a pipeline run.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use super::{BrowserHandle, PageDriver, ProvisionStrategy, Provisioner};
use crate::environment::EnvironmentProfile;
use crate::error::{ProvisioningError, ProvisioningFailure, RenderError};
use crate::render::PdfLayout;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Navigation settles and capture yields these bytes.
    Pdf(Vec<u8>),
    /// Navigation never settles.
    NavigationHangs,
    NavigationFails(String),
    CaptureFails(String),
}

/// Launch/release accounting shared by all pages of one provisioner.
#[derive(Debug, Default)]
pub struct ProcessLedger {
    launched: AtomicUsize,
    released: AtomicUsize,
}

impl ProcessLedger {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Pages launched and not yet shut down.
    pub fn live(&self) -> usize {
        self.launched().saturating_sub(self.released())
    }
}

#[derive(Debug, Clone)]
pub struct MockProvisioner {
    behavior: MockBehavior,
    launch_failure: Option<String>,
    ledger: Arc<ProcessLedger>,
    visited: Arc<Mutex<Vec<Url>>>,
}

impl MockProvisioner {
    pub fn rendering(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_behavior(MockBehavior::Pdf(bytes.into()))
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            launch_failure: None,
            ledger: Arc::new(ProcessLedger::default()),
            visited: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `acquire` fails with a launch error.
    pub fn failing_launch(message: impl Into<String>) -> Self {
        let mut mock = Self::rendering(Vec::new());
        mock.launch_failure = Some(message.into());
        mock
    }

    /// Renders the contents of a file on disk.
    pub fn from_pdf_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::rendering(std::fs::read(path)?))
    }

    pub fn ledger(&self) -> Arc<ProcessLedger> {
        Arc::clone(&self.ledger)
    }

    /// URLs navigated to, in order.
    pub fn visited(&self) -> Vec<Url> {
        self.visited
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn acquire(&self, _profile: &EnvironmentProfile) -> Result<BrowserHandle, ProvisioningError> {
        if let Some(message) = &self.launch_failure {
            return Err(ProvisioningError::new(
                ProvisionStrategy::Mock,
                ProvisioningFailure::Launch {
                    executable: "mock".into(),
                    message: message.clone(),
                },
            ));
        }
        self.ledger.launched.fetch_add(1, Ordering::SeqCst);
        let page = MockPage {
            behavior: self.behavior.clone(),
            ledger: Arc::clone(&self.ledger),
            visited: Arc::clone(&self.visited),
            shut_down: false,
        };
        Ok(BrowserHandle::new(ProvisionStrategy::Mock, Box::new(page)))
    }
}

struct MockPage {
    behavior: MockBehavior,
    ledger: Arc<ProcessLedger>,
    visited: Arc<Mutex<Vec<Url>>>,
    shut_down: bool,
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&mut self, url: &Url, _quiet_window: Duration) -> Result<(), RenderError> {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.clone());
        }
        match &self.behavior {
            MockBehavior::NavigationHangs => futures::future::pending().await,
            MockBehavior::NavigationFails(message) => Err(RenderError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            }),
            MockBehavior::Pdf(_) | MockBehavior::CaptureFails(_) => Ok(()),
        }
    }

    async fn print_pdf(&mut self, _layout: &PdfLayout) -> Result<Vec<u8>, RenderError> {
        match &self.behavior {
            MockBehavior::Pdf(bytes) => Ok(bytes.clone()),
            MockBehavior::CaptureFails(message) => Err(RenderError::Capture(message.clone())),
            MockBehavior::NavigationHangs | MockBehavior::NavigationFails(_) => {
                Err(RenderError::Capture("page was never loaded".into()))
            }
        }
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        if !self.shut_down {
            self.shut_down = true;
            self.ledger.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockPage {
    // Mirrors a real browser being killed when its handle is dropped.
    fn drop(&mut self) {
        if !self.shut_down {
            self.ledger.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::OsFamily;

    #[tokio::test]
    async fn release_balances_the_ledger() {
        let mock = MockProvisioner::rendering(b"%PDF-1.7".to_vec());
        let ledger = mock.ledger();
        let mut handle = mock
            .acquire(&EnvironmentProfile::local(OsFamily::Linux))
            .await
            .unwrap();
        assert_eq!(ledger.live(), 1);

        let url = Url::parse("http://localhost:3000/print/quote/Q1").unwrap();
        handle.navigate(&url, Duration::from_millis(1)).await.unwrap();
        let bytes = handle.print_pdf(&PdfLayout::a4()).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");

        handle.release().await;
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.released(), 1);
        assert_eq!(mock.visited(), vec![url]);
    }

    #[tokio::test]
    async fn dropped_handle_still_counts_as_released() {
        let mock = MockProvisioner::rendering(b"%PDF".to_vec());
        let ledger = mock.ledger();
        let handle = mock
            .acquire(&EnvironmentProfile::local(OsFamily::Linux))
            .await
            .unwrap();
        drop(handle);
        assert_eq!(ledger.live(), 0);
    }

    #[tokio::test]
    async fn failing_launch_never_counts_a_process() {
        let mock = MockProvisioner::failing_launch("no chrome");
        let err = mock
            .acquire(&EnvironmentProfile::local(OsFamily::Linux))
            .await
            .unwrap_err();
        assert_eq!(err.strategy, ProvisionStrategy::Mock);
        assert_eq!(mock.ledger().launched(), 0);
    }

    #[tokio::test]
    async fn from_pdf_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.pdf");
        std::fs::write(&path, b"%PDF-fixture").unwrap();
        let mock = MockProvisioner::from_pdf_file(&path).unwrap();
        assert!(matches!(mock.behavior, MockBehavior::Pdf(ref b) if b == b"%PDF-fixture"));
        assert!(MockProvisioner::from_pdf_file(&dir.path().join("missing.pdf")).is_err());
    }
}
