use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{MediaError, MediaHost, UploadedMedia};

/// Stores media under a local directory; the router serves it at `/media`.
pub struct LocalMediaHost {
    root: PathBuf,
    public_url: String,
}

impl LocalMediaHost {
    pub fn new(root: PathBuf, public_url: String) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create media root {}", root.display()))?;
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[axum::async_trait]
impl MediaHost for LocalMediaHost {
    async fn upload(&self, path: &Path) -> Result<UploadedMedia, MediaError> {
        let name = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };
        tokio::fs::copy(path, self.root.join(&name)).await?;
        Ok(UploadedMedia {
            url: format!("{}/media/{}", self.public_url, name),
            handle: name,
            duration: None,
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        if handle.is_empty() || handle.contains(['/', '\\']) || handle.starts_with('.') {
            return Err(MediaError::Rejected(format!("invalid media handle {handle:?}")));
        }
        match tokio::fs::remove_file(self.root.join(handle)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let source = spool.path().join("clip.mp4");
        std::fs::write(&source, b"not really a video").unwrap();

        let host = LocalMediaHost::new(root.path().to_owned(), "http://localhost:8000/".into())
            .unwrap();
        let media = host.upload(&source).await.unwrap();

        assert!(media.handle.ends_with(".mp4"));
        assert_eq!(
            media.url,
            format!("http://localhost:8000/media/{}", media.handle)
        );
        assert!(host.root().join(&media.handle).exists());

        host.delete(&media.handle).await.unwrap();
        assert!(!host.root().join(&media.handle).exists());
        // already gone
        host.delete(&media.handle).await.unwrap();
    }

    #[tokio::test]
    async fn refuses_handles_outside_root() {
        let root = tempfile::tempdir().unwrap();
        let host = LocalMediaHost::new(root.path().to_owned(), "http://x".into()).unwrap();
        assert!(host.delete("../secrets").await.is_err());
        assert!(host.delete("").await.is_err());
    }
}
