use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{MediaError, MediaHost, UploadedMedia};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client for Cloudinary")?;
        Ok(Self { client, config })
    }

    fn signed_params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp().to_string();
        params.push(("timestamp", timestamp));
        let signature = sign(&params, &self.config.api_secret);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature_algorithm", "sha256".to_owned()));
        params.push(("signature", signature));
        params
    }
}

/// Request signature: the parameters sorted by name, joined as a query
/// string, suffixed with the API secret and hashed.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

async fn error_text(response: reqwest::Response) -> MediaError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    MediaError::Rejected(format!("{status}: {body}"))
}

#[axum::async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, path: &Path) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        for (key, value) in self.signed_params(vec![]) {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(format!("{API_BASE}/{}/auto/upload", self.config.cloud_name))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_text(response).await);
        }
        let body: UploadResponse = response.json().await?;
        Ok(UploadedMedia {
            url: body.secure_url,
            handle: format!("{}/{}", body.resource_type, body.public_id),
            duration: body.duration,
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        let (resource_type, public_id) = handle
            .split_once('/')
            .ok_or_else(|| MediaError::Rejected(format!("invalid media handle {handle:?}")))?;
        let params = self.signed_params(vec![("public_id", public_id.to_owned())]);

        let response = self
            .client
            .post(format!(
                "{API_BASE}/{}/{resource_type}/destroy",
                self.config.cloud_name
            ))
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_text(response).await);
        }
        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Rejected(format!("destroy returned {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_parameters() {
        let params = vec![
            ("timestamp", "1315060510".to_owned()),
            ("public_id", "sample_image".to_owned()),
        ];
        assert_eq!(
            sign(&params, "abcd"),
            "e3c44b54e67a3ecc918f5d7236ca5faa36250ea8a8cd6cbabfd2d6bb2453acac"
        );
    }
}
