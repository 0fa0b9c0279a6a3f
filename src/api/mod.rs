//! Remote video-synthesis service surface: the [`VideoService`] seam the
//! orchestration code runs against, plus the wire types shared with the
//! HTTP implementation in [`runway`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod runway;

pub use runway::RunwayClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A keyframe reference in a generation request.
#[derive(Debug, Clone, Serialize)]
pub struct PromptImage {
    pub uri: String,
    pub position: &'static str,
}

impl PromptImage {
    pub fn first(uri: String) -> Self {
        Self {
            uri,
            position: "first",
        }
    }

    pub fn last(uri: String) -> Self {
        Self {
            uri,
            position: "last",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    #[serde(rename = "promptImage")]
    pub prompt_image: Vec<PromptImage>,
    #[serde(rename = "promptText")]
    pub prompt_text: String,
    pub ratio: String,
    pub duration: u32,
    #[serde(rename = "includeAudio", skip_serializing_if = "Option::is_none")]
    pub include_audio: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Throttled,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// Forward compatibility: treat a status we do not know as terminal so a
    /// poll loop cannot spin on it forever.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Throttled | TaskStatus::Running)
    }
}

/// Terminal state of a generation task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResult {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default, rename = "failureCode")]
    pub failure_code: Option<String>,
}

/// The remote service as the orchestration layer sees it. The production
/// implementation is [`RunwayClient`]; tests substitute a mock.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Upload one reference image, returning the service's reference URI.
    async fn upload_image(&self, path: &Path) -> Result<String, ApiError>;

    /// Submit one generation request, returning the task id.
    async fn create_video_task(&self, request: &GenerationRequest) -> Result<String, ApiError>;

    /// Block until the task reaches a terminal state.
    async fn await_task(&self, task_id: &str) -> Result<TaskResult, ApiError>;

    /// Download a result URL to a local file, creating parent directories.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ApiError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_terminality() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Throttled.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Unknown.is_terminal());
    }

    #[test]
    fn task_result_deserializes_service_shape() {
        let json = r#"{
            "id": "abc123",
            "status": "SUCCEEDED",
            "output": ["https://host/clip.mp4"]
        }"#;
        let result: TaskResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.status, TaskStatus::Succeeded);
        assert_eq!(result.output.len(), 1);
        assert!(result.failure.is_none());

        let json = r#"{"id": "x", "status": "SOMETHING_NEW"}"#;
        let result: TaskResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.status, TaskStatus::Unknown);
    }

    #[test]
    fn generation_request_uses_wire_field_names() {
        let request = GenerationRequest {
            model: "veo3.1".to_string(),
            prompt_image: vec![PromptImage::first("mock://a".to_string())],
            prompt_text: "a dog".to_string(),
            ratio: "1280:720".to_string(),
            duration: 6,
            include_audio: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("promptImage").is_some());
        assert!(value.get("promptText").is_some());
        assert!(value.get("includeAudio").is_none());
        assert_eq!(value["promptImage"][0]["position"], "first");
    }
}
