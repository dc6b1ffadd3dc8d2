//! Artifact upload to a Nexus raw repository.

use base64::Engine;
use eyre::{Context, Result};
use reqwest::{Client, StatusCode};
use std::path::Path;

/// Basic-auth uploader for a Nexus raw (or Maven) repository.
pub struct NexusUploader {
    client: Client,
    base_url: String,
}

impl NexusUploader {
    /// Build an uploader with Basic auth preconfigured on every request.
    pub fn try_new(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Basic {}", credentials).parse()?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .with_context(|| "Failed to build Nexus HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// PUT a file to `{base_url}/{filename}`.
    ///
    /// Success is exactly HTTP 200, 201, or 204. Anything else is an error
    /// carrying the response body. Returns the upload URL.
    pub async fn upload(&self, file: &Path) -> Result<String> {
        let filename = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                eyre::eyre!("Upload path has no usable file name: {}", file.display())
            })?;
        let upload_url = join_upload_url(&self.base_url, filename);

        log::info!("Uploading {} to Nexus at {}", filename, upload_url);

        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read upload file: {}", file.display()))?;
        let response = self
            .client
            .put(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(bytes)
            .send()
            .await
            .with_context(|| "Failed to send Nexus upload request")?;

        let status = response.status();
        if is_upload_success(status) {
            log::info!("Upload to Nexus succeeded.");
            Ok(upload_url)
        } else {
            let body = response.text().await.unwrap_or_default();
            log::error!("Nexus upload failed! Status {}: {}", status, body);
            eyre::bail!("Nexus upload failed ({}): {}", status, body)
        }
    }
}

/// Only 200/201/204 count as an accepted upload.
fn is_upload_success(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
    )
}

fn join_upload_url(base: &str, filename: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_upload_url_trailing_slash() {
        assert_eq!(
            join_upload_url("https://nexus.example.com/repository/tableau/", "Sales.twbx.zip"),
            "https://nexus.example.com/repository/tableau/Sales.twbx.zip"
        );
    }

    #[test]
    fn test_join_upload_url_no_trailing_slash() {
        assert_eq!(
            join_upload_url("https://nexus.example.com/repository/tableau", "Sales.twbx.zip"),
            "https://nexus.example.com/repository/tableau/Sales.twbx.zip"
        );
    }

    #[test]
    fn test_upload_success_statuses() {
        assert!(is_upload_success(StatusCode::OK));
        assert!(is_upload_success(StatusCode::CREATED));
        assert!(is_upload_success(StatusCode::NO_CONTENT));
    }

    #[test]
    fn test_upload_rejected_statuses() {
        // 2xx statuses outside the accepted set still count as failures
        assert!(!is_upload_success(StatusCode::ACCEPTED));
        assert!(!is_upload_success(StatusCode::BAD_REQUEST));
        assert!(!is_upload_success(StatusCode::UNAUTHORIZED));
        assert!(!is_upload_success(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_try_new_builds_client() {
        let uploader =
            NexusUploader::try_new("https://nexus.example.com/repository/tableau", "ci", "secret")
                .unwrap();
        assert_eq!(uploader.base_url, "https://nexus.example.com/repository/tableau");
    }
}
