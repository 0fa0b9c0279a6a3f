//! HTTP client for the Runway REST API.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::{ApiError, GenerationRequest, TaskResult, VideoService};

const API_BASE: &str = "https://api.dev.runwayml.com";
const API_VERSION: &str = "2024-11-06";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub struct RunwayClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: String,
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

async fn error_from_response(resp: reqwest::Response) -> ApiError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let snippet = body.chars().take(800).collect::<String>();
    ApiError::Status {
        status,
        body: snippet,
    }
}

impl RunwayClient {
    pub fn new(api_key: String) -> Result<Self, ApiError> {
        Self::with_base_url(api_key, API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_task(&self, task_id: &str) -> Result<TaskResult, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/tasks/{task_id}")))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let raw = resp.text().await?;
        serde_json::from_str(&raw).map_err(|err| {
            let snippet = raw.chars().take(200).collect::<String>();
            ApiError::Decode(format!("task poll: {err} (body starts: {snippet})"))
        })
    }
}

#[async_trait]
impl VideoService for RunwayClient {
    async fn upload_image(&self, path: &Path) -> Result<String, ApiError> {
        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))
            .map_err(ApiError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.url("/v1/ephemeral_uploads"))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let upload: UploadResponse = resp.json().await?;
        Ok(upload.uri)
    }

    async fn create_video_task(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/v1/image_to_video"))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let created: CreateTaskResponse = resp.json().await?;
        Ok(created.id)
    }

    async fn await_task(&self, task_id: &str) -> Result<TaskResult, ApiError> {
        loop {
            match self.fetch_task(task_id).await {
                Ok(task) if task.status.is_terminal() => return Ok(task),
                Ok(_) => {}
                // Transient poll errors are retried on the next tick; the
                // request's own timeout already bounds each attempt.
                Err(ApiError::Http(err)) if err.is_timeout() || err.is_connect() => {
                    warn!("task {task_id}: poll failed, retrying: {err}");
                }
                Err(err) => return Err(err),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        let mut resp = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
