//! Data types flowing through the pipeline.
//!
//! - [`RenderRequest`] - validated, immutable request for one document
//! - [`UploadTarget`] - pre-authorized remote upload destination
//! - [`RenderedArtifact`] - captured bytes plus where they were persisted
//! - [`StorageLocator`] - local path or remote storage id

mod artifact;
mod request;

pub use artifact::{artifact_filename, RenderedArtifact, StorageLocator};
pub use request::{page_url, DocumentKind, RenderRequest, RequestParams, UploadTarget};
