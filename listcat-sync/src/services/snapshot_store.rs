//! Flat-file snapshot persistence
//!
//! One pretty-printed JSON document at a well-known path, replaced atomically
//! through a temporary file and rename.

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Snapshot, SNAPSHOT_VERSION};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot atomically
    pub async fn save(&self, snapshot: &Snapshot) -> CatalogResult<()> {
        let mut document = snapshot.clone();
        document.version = SNAPSHOT_VERSION;

        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| CatalogError::Persistence(format!("Serialize snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CatalogError::Persistence(format!("Create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| CatalogError::Persistence(format!("Write {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| CatalogError::Persistence(format!("Replace {}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Snapshot saved");
        Ok(())
    }

    /// Load the snapshot; `Ok(None)` when none has been written yet
    pub async fn load(&self) -> CatalogResult<Option<Snapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CatalogError::Persistence(format!(
                    "Read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            CatalogError::Persistence(format!("Parse {}: {}", self.path.display(), e))
        })?;

        info!(
            path = %self.path.display(),
            lists = snapshot.lists.len(),
            metadata = snapshot.metadata.len(),
            revision = snapshot.revision,
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
