//! CDP-backed page driver.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::Page;
use futures::{stream, StreamExt};
use std::io;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::provisioner::LaunchPlan;
use super::PageDriver;
use crate::error::{ProvisioningFailure, RenderError};
use crate::render::idle::{wait_for_quiescence, NetworkEvent};
use crate::render::PdfLayout;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    // Removed when the page is dropped.
    _profile_dir: TempDir,
}

impl ChromiumPage {
    pub(crate) async fn launch(plan: &LaunchPlan) -> Result<Self, ProvisioningFailure> {
        let launch_failure = |message: String| ProvisioningFailure::Launch {
            executable: plan.executable.clone(),
            message,
        };

        let profile_dir = tempfile::Builder::new()
            .prefix("docpipe-profile-")
            .tempdir()
            .map_err(|e| launch_failure(format!("failed to create profile dir: {e}")))?;

        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(&plan.executable)
            .user_data_dir(profile_dir.path())
            .launch_timeout(plan.launch_timeout)
            .request_timeout(plan.request_timeout)
            .window_size(plan.viewport.width, plan.viewport.height)
            .viewport(CdpViewport {
                width: plan.viewport.width,
                height: plan.viewport.height,
                ..CdpViewport::default()
            })
            .args(plan.args.iter().copied());
        if plan.hardened {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(launch_failure)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| launch_failure(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.kill().await;
                handler.abort();
                return Err(launch_failure(format!("failed to open page: {err}")));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            _profile_dir: profile_dir,
        })
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&mut self, url: &Url, quiet_window: Duration) -> Result<(), RenderError> {
        let navigation = |message: String| RenderError::Navigation {
            url: url.to_string(),
            message,
        };

        // Listeners go first so requests started by the navigation are seen.
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| navigation(e.to_string()))?
            .map(|e| NetworkEvent::Started(e.request_id.inner().clone()));
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| navigation(e.to_string()))?
            .map(|e| NetworkEvent::Settled(e.request_id.inner().clone()));
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| navigation(e.to_string()))?
            .map(|e| NetworkEvent::Settled(e.request_id.inner().clone()));
        let events = stream::select(started, stream::select(finished, failed));

        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| navigation(e.to_string()))?;

        wait_for_quiescence(events, quiet_window)
            .await
            .map_err(|e| navigation(e.to_string()))
    }

    async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, RenderError> {
        let params = PrintToPdfParams {
            landscape: Some(layout.landscape),
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width_in),
            paper_height: Some(layout.paper_height_in),
            margin_top: Some(layout.margin_in),
            margin_bottom: Some(layout.margin_in),
            margin_left: Some(layout.margin_in),
            margin_right: Some(layout.margin_in),
            prefer_css_page_size: Some(false),
            ..PrintToPdfParams::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        let closed = matches!(timeout(CLOSE_TIMEOUT, self.browser.close()).await, Ok(Ok(_)));
        let exited = closed && matches!(timeout(CLOSE_TIMEOUT, self.browser.wait()).await, Ok(Ok(_)));
        if !exited {
            warn!("browser did not exit cleanly; killing process");
            if let Some(Err(err)) = self.browser.kill().await {
                self.handler.abort();
                return Err(err);
            }
        }
        self.handler.abort();
        Ok(())
    }
}
