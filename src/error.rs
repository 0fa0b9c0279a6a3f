use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;

fn list_upload_failures(failures: &[(String, ApiError)]) -> String {
    failures
        .iter()
        .map(|(key, err)| format!("  {key}: {err}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Aggregate failure of the upload phase. Generation cannot proceed without a
/// complete reference mapping, so this aborts the whole run. Every failed
/// image is named, not just the first.
#[derive(Debug, Error)]
#[error("{} image upload(s) failed:\n{}", .failures.len(), list_upload_failures(.failures))]
pub struct UploadError {
    pub failures: Vec<(String, ApiError)>,
}

/// Failure of a single segment task. Isolated: it never aborts or cancels
/// sibling segments.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("model '{model}' does not support first+last frame; use one of: {alternatives}")]
    EndFrameUnsupported { model: String, alternatives: String },
    #[error("segment references an image that cannot be resolved")]
    UnresolvedReference,
    #[error("no uploaded reference for image {}", .path.display())]
    MissingUpload { path: PathBuf },
    #[error("generation task failed: {reason}")]
    TaskFailed { reason: String },
    #[error("generation task returned no output")]
    NoOutput,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("download failed: {0}")]
    Transfer(#[source] ApiError),
}
