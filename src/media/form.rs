use std::{collections::HashMap, path::Path};

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;

use super::TempUpload;
use crate::errors::RequestError;

/// A parsed multipart body: text fields in memory, file parts spooled to disk.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, TempUpload>,
}

impl MultipartForm {
    pub async fn parse(mut multipart: Multipart, spool_dir: &Path) -> Result<Self, RequestError> {
        tokio::fs::create_dir_all(spool_dir)
            .await
            .map_err(|e| RequestError::Unexpected(e.into()))?;
        let mut form = MultipartForm::default();

        while let Some(mut field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let Some(file_name) = field.file_name().map(str::to_owned) else {
                form.fields.insert(name, field.text().await?);
                continue;
            };

            let extension = Path::new(&file_name)
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
                .unwrap_or_default();
            let path = spool_dir.join(format!("{}{}", uuid::Uuid::new_v4(), extension));
            let mut file = tokio::fs::File::create(&path)
                .await
                .map_err(|e| RequestError::Unexpected(e.into()))?;
            // owns the path from here so it is cleaned up on every exit
            let mut upload = TempUpload::new(path, Some(file_name), 0);
            while let Some(chunk) = field.chunk().await? {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| RequestError::Unexpected(e.into()))?;
                upload.size += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| RequestError::Unexpected(e.into()))?;

            // browsers send an empty part for an untouched file input
            if upload.size > 0 {
                form.files.insert(name, upload);
            }
        }
        Ok(form)
    }

    /// Trimmed text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }

    pub fn take_file(&mut self, name: &str) -> Option<TempUpload> {
        self.files.remove(name)
    }
}
