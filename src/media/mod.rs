//! Upload adapter for user media (avatars, cover images, videos, thumbnails).
//!
//! Files arrive as multipart parts, are spooled to a [`TempUpload`] on local
//! disk and then pushed to a [`MediaHost`]. The spool file is removed once the
//! upload attempt finishes, whatever its outcome. Callers that push several
//! files for one logical operation undo the ones that succeeded with
//! [`rollback_uploads`] when a later step fails.

mod cloudinary;
mod form;
mod local;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;

pub use cloudinary::CloudinaryHost;
pub use form::MultipartForm;
pub use local::LocalMediaHost;

use crate::config::MediaConfig;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected the request: {0}")]
    Rejected(String),
}

/// A file stored on the media host.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    /// Stable public URL.
    pub url: String,
    /// Opaque value passed back to [`MediaHost::delete`].
    pub handle: String,
    /// Playback length in seconds, for audio and video.
    pub duration: Option<f64>,
}

#[axum::async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<UploadedMedia, MediaError>;

    /// Deleting a handle that is already gone succeeds.
    async fn delete(&self, handle: &str) -> Result<(), MediaError>;
}

pub fn media_host_from_config(config: &MediaConfig) -> Result<Arc<dyn MediaHost>> {
    Ok(match config {
        MediaConfig::Cloudinary(cloudinary) => Arc::new(CloudinaryHost::new(cloudinary.clone())?),
        MediaConfig::Local { root, public_url } => {
            Arc::new(LocalMediaHost::new(root.clone(), public_url.clone())?)
        }
    })
}

/// A client file spooled to local disk. The file is removed on drop.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    file_name: Option<String>,
    size: u64,
}

impl TempUpload {
    pub(crate) fn new(path: PathBuf, file_name: Option<String>, size: u64) -> Self {
        Self {
            path,
            file_name,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp upload");
            }
        }
    }
}

/// Pushes a spooled file to the host. The local copy is gone afterwards.
pub async fn upload(host: &dyn MediaHost, file: TempUpload) -> Result<UploadedMedia, MediaError> {
    let result = host.upload(file.path()).await;
    match &result {
        Ok(media) => tracing::info!(url = %media.url, size = file.size(), "uploaded media"),
        Err(e) => tracing::warn!(error = %e, file = ?file.file_name(), "media upload failed"),
    }
    drop(file);
    result
}

/// Best-effort removal of assets uploaded earlier in a failed operation.
pub async fn rollback_uploads(host: &dyn MediaHost, uploads: &[&UploadedMedia]) {
    for media in uploads {
        delete_quietly(host, &media.handle).await;
    }
}

/// Deletes a host asset, logging instead of failing.
pub async fn delete_quietly(host: &dyn MediaHost, handle: &str) {
    match host.delete(handle).await {
        Ok(()) => tracing::info!(handle, "deleted media"),
        Err(e) => tracing::warn!(handle, error = %e, "failed to delete media"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingHost {
        deleted: Mutex<Vec<String>>,
        fail_uploads: bool,
    }

    #[axum::async_trait]
    impl MediaHost for RecordingHost {
        async fn upload(&self, path: &Path) -> Result<UploadedMedia, MediaError> {
            if self.fail_uploads {
                return Err(MediaError::Rejected("quota exceeded".into()));
            }
            Ok(UploadedMedia {
                url: format!("https://cdn.test/{}", path.display()),
                handle: path.display().to_string(),
                duration: None,
            })
        }

        async fn delete(&self, handle: &str) -> Result<(), MediaError> {
            self.deleted.lock().unwrap().push(handle.to_owned());
            Ok(())
        }
    }

    fn spool(dir: &Path, name: &str) -> TempUpload {
        let path = dir.join(name);
        std::fs::write(&path, b"bytes").unwrap();
        TempUpload::new(path, Some(name.to_owned()), 5)
    }

    #[tokio::test]
    async fn temp_file_is_removed_after_successful_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = spool(dir.path(), "avatar.png");
        let path = file.path().to_owned();
        let host = RecordingHost::default();

        upload(&host, file).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn temp_file_is_removed_after_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = spool(dir.path(), "avatar.png");
        let path = file.path().to_owned();
        let host = RecordingHost {
            fail_uploads: true,
            ..Default::default()
        };

        assert!(upload(&host, file).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rollback_deletes_every_upload() {
        let host = RecordingHost::default();
        let first = UploadedMedia {
            url: "u1".into(),
            handle: "h1".into(),
            duration: None,
        };
        let second = UploadedMedia {
            url: "u2".into(),
            handle: "h2".into(),
            duration: Some(3.5),
        };
        rollback_uploads(&host, &[&first, &second]).await;
        assert_eq!(*host.deleted.lock().unwrap(), vec!["h1", "h2"]);
    }
}
