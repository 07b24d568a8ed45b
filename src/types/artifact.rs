use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::DocumentKind;

static GENERATION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Where a persisted artifact can be retrieved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageLocator {
    Local {
        path: PathBuf,
    },
    Remote {
        #[serde(rename = "storageId")]
        storage_id: String,
    },
}

/// Rendered PDF bytes and the places they were delivered to.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub generated_at: DateTime<Utc>,
    pub locators: Vec<StorageLocator>,
}

impl RenderedArtifact {
    pub fn local_path(&self) -> Option<&Path> {
        self.locators.iter().find_map(|loc| match loc {
            StorageLocator::Local { path } => Some(path.as_path()),
            StorageLocator::Remote { .. } => None,
        })
    }

    pub fn storage_id(&self) -> Option<&str> {
        self.locators.iter().find_map(|loc| match loc {
            StorageLocator::Remote { storage_id } => Some(storage_id.as_str()),
            StorageLocator::Local { .. } => None,
        })
    }
}

/// Name for one generation event: `{kind}-{id}-{unix millis}-{sequence}.pdf`.
///
/// The process-wide sequence keeps names distinct when the same document is
/// generated more than once within a millisecond.
pub fn artifact_filename(kind: DocumentKind, document_id: &str, at: DateTime<Utc>) -> String {
    let sequence = GENERATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut id = sanitize_filename::sanitize(document_id.trim()).replace(' ', "_");
    if id.is_empty() {
        id = "document".to_string();
    }
    format!(
        "{}-{}-{}-{}.pdf",
        kind.as_str(),
        id,
        at.timestamp_millis(),
        sequence
    )
}
