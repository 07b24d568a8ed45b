use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::LocalPersistError;

/// Writes artifacts under a single output directory.
#[derive(Debug, Clone)]
pub struct LocalDiskSink {
    dir: PathBuf,
}

impl LocalDiskSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and write `filename`. Never overwrites.
    pub async fn write(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, LocalPersistError> {
        let path = self.dir.join(filename);
        let fail = |source| LocalPersistError {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(|source| LocalPersistError {
            path: self.dir.clone(),
            source,
        })?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(fail)?;
        file.write_all(bytes).await.map_err(fail)?;
        file.flush().await.map_err(fail)?;
        Ok(path)
    }
}
