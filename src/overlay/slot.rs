//! Per-session overlay file slot

use std::io;
use std::path::{Path, PathBuf};

use crate::registry::SessionId;

/// The canonical overlay path of one session and its staging path.
///
/// New images are written to the staging path and renamed onto the canonical
/// path, so a reader only ever sees a complete previous or complete new image.
/// Both directories must be on the same filesystem for the rename to be atomic.
#[derive(Debug, Clone)]
pub struct OverlaySlot {
    canonical: PathBuf,
    staging: PathBuf,
}

impl OverlaySlot {
    /// Lay out the slot for `session`: `{overlay_dir}/{id}.png` and
    /// `{scratch_dir}/{id}_temp.png`
    pub fn new(overlay_dir: &Path, scratch_dir: &Path, session: &SessionId) -> Self {
        Self {
            canonical: overlay_dir.join(format!("{}.png", session)),
            staging: scratch_dir.join(format!("{}_temp.png", session)),
        }
    }

    /// Path the transcoder reads
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Path new images are staged at
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    /// Atomically replace the canonical image
    pub async fn publish(&self, image: &[u8]) -> io::Result<()> {
        if image.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to publish an empty overlay image",
            ));
        }

        tokio::fs::write(&self.staging, image).await?;
        tokio::fs::rename(&self.staging, &self.canonical).await
    }

    /// Remove both files. Errors are logged, never returned.
    pub async fn clear(&self, session: &SessionId) {
        for path in [&self.canonical, &self.staging] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    tracing::info!(session = %session, path = %path.display(), "Removed overlay image file");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(
                        session = %session,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove overlay image file"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(dir: &Path) -> (OverlaySlot, SessionId) {
        let id = SessionId::parse("match42").unwrap();
        let scratch = dir.join("buffer");
        std::fs::create_dir_all(&scratch).unwrap();
        (OverlaySlot::new(dir, &scratch, &id), id)
    }

    #[test]
    fn test_layout() {
        let id = SessionId::parse("match42").unwrap();
        let slot = OverlaySlot::new(Path::new("."), Path::new("buffer"), &id);

        assert_eq!(slot.canonical(), Path::new("./match42.png"));
        assert_eq!(slot.staging(), Path::new("buffer/match42_temp.png"));
    }

    #[tokio::test]
    async fn test_publish_replaces_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let (slot, _) = slot(dir.path());

        slot.publish(b"first").await.unwrap();
        slot.publish(b"second image").await.unwrap();

        assert_eq!(std::fs::read(slot.canonical()).unwrap(), b"second image");
        assert!(!slot.staging().exists());
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_image() {
        let dir = tempfile::tempdir().unwrap();
        let (slot, _) = slot(dir.path());
        slot.publish(b"kept").await.unwrap();

        let err = slot.publish(b"").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(std::fs::read(slot.canonical()).unwrap(), b"kept");
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (slot, id) = slot(dir.path());
        slot.publish(b"image").await.unwrap();
        std::fs::write(slot.staging(), b"leftover").unwrap();

        slot.clear(&id).await;
        assert!(!slot.canonical().exists());
        assert!(!slot.staging().exists());

        slot.clear(&id).await;
    }
}
