//! Document rendering and delivery.
//!
//! Turns a business document (quote or invoice) served as a printable web
//! page into an A4 PDF and delivers it to local disk, remote storage, or
//! both, depending on where the process runs.
//!
//! # Module Overview
//!
//! - [`environment`] - execution-environment classification
//! - [`browser`] - headless browser provisioning and scoped handles
//! - [`render`] - navigation, network quiescence and PDF capture
//! - [`sink`] - local and remote artifact persistence
//! - [`pipeline`] - the per-request orchestrator and its stages
//! - [`server`] - HTTP surface
//! - [`config`] - configuration file support
//! - [`types`] - requests, artifacts and locators
//! - [`output`] - JSON response schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docpipe_lib::browser::ChromiumProvisioner;
//! use docpipe_lib::{Config, DocumentKind, EnvironmentProfile, Orchestrator, RenderRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let provisioner = ChromiumProvisioner::new(config.browser.clone(), config.render.navigation_timeout);
//! let orchestrator = Orchestrator::from_config(&config, Arc::new(provisioner))?;
//!
//! let request = RenderRequest::new(DocumentKind::Quote, "Q1")?;
//! let outcome = orchestrator.run(&request, &EnvironmentProfile::detect()).await?;
//! println!("{}", outcome.artifact.filename);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod environment;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod sink;
pub mod types;
pub mod viewport;

pub use browser::{BrowserHandle, ChromiumProvisioner, ProvisionStrategy, Provisioner};
pub use config::Config;
pub use environment::{EnvironmentProfile, ExecutionMode, OsFamily, ProfileSource};
pub use error::{
    ConfigError, ErrorCategory, ErrorPayload, LocalPersistError, PipelineError, ProvisioningError,
    RenderError, Result, UploadError, ValidationError,
};
pub use output::{
    DocpipeOutput, DoctorOutput, ErrorOutput, FailureResponse, HealthResponse, RenderOutput,
    RenderResponse, DOCPIPE_OUTPUT_VERSION,
};
pub use pipeline::{Orchestrator, PipelineStage, RenderOutcome};
pub use render::{PageRenderer, PdfLayout};
pub use sink::{ArtifactSink, HttpRemoteStore, RemoteStore, SinkPlan};
pub use types::{
    DocumentKind, RenderRequest, RenderedArtifact, RequestParams, StorageLocator, UploadTarget,
};
pub use viewport::Viewport;
