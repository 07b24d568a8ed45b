//! Page rendering: navigate, wait for the network to settle, print.

pub mod idle;

use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};
use url::Url;

use crate::browser::BrowserHandle;
use crate::config::RenderConfig;
use crate::error::RenderError;

/// Print layout in inches.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
    pub print_background: bool,
    pub landscape: bool,
}

impl PdfLayout {
    /// A4 portrait, backgrounds on, no margins.
    pub fn a4() -> Self {
        Self {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.0,
            print_background: true,
            landscape: false,
        }
    }
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::a4()
    }
}

#[derive(Debug, Clone)]
pub struct PageRenderer {
    quiet_window: Duration,
    grace_delay: Duration,
    layout: PdfLayout,
}

impl PageRenderer {
    pub fn new(settings: &RenderConfig) -> Self {
        Self {
            quiet_window: settings.quiet_window,
            grace_delay: settings.grace_delay,
            layout: PdfLayout::a4(),
        }
    }

    /// Render `url` in the handle's page.
    ///
    /// `navigation_timeout` bounds navigation plus the quiescence wait. The
    /// grace delay runs after quiescence and is not counted against it.
    pub async fn render(
        &self,
        handle: &mut BrowserHandle,
        url: &Url,
        navigation_timeout: Duration,
    ) -> Result<Vec<u8>, RenderError> {
        let start = Instant::now();
        timeout(navigation_timeout, handle.navigate(url, self.quiet_window))
            .await
            .map_err(|_| RenderError::Timeout {
                url: url.to_string(),
                after: navigation_timeout,
            })??;
        debug!(
            session = handle.session(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page settled"
        );

        if !self.grace_delay.is_zero() {
            sleep(self.grace_delay).await;
        }

        let bytes = handle.print_pdf(&self.layout).await?;
        if bytes.is_empty() {
            return Err(RenderError::Capture("browser returned an empty document".into()));
        }
        info!(
            session = handle.session(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page rendered"
        );
        Ok(bytes)
    }
}
