use std::path::Path;

use crate::api::{GenerationRequest, PromptImage, TaskStatus, VideoService};
use crate::capability::{CapabilityTable, DEFAULT_DURATION_SECS};
use crate::config::{FramePosition, JobConfig, SegmentSpec};
use crate::error::SegmentError;
use crate::images::canonical_key;
use crate::upload::UploadMap;

fn remote_reference(
    job: &JobConfig,
    segment: &SegmentSpec,
    position: FramePosition,
    config_dir: &Path,
    uploads: &UploadMap,
) -> Result<String, SegmentError> {
    let path = job
        .frame_path(segment, position, config_dir)
        .ok_or(SegmentError::UnresolvedReference)?;
    uploads
        .get(&canonical_key(&path))
        .cloned()
        .ok_or(SegmentError::MissingUpload { path })
}

/// Build and submit one generation request, wait for the task to reach a
/// terminal state, and return the first output URL. The caller downloads it
/// to the pre-computed destination.
///
/// The end-frame capability check runs again here even though validation
/// already covered it: generation may execute against a job that was only
/// partially re-validated, and a doomed request must fail before any network
/// call.
pub async fn generate_segment(
    service: &dyn VideoService,
    caps: &CapabilityTable,
    job: &JobConfig,
    config_dir: &Path,
    segment: &SegmentSpec,
    uploads: &UploadMap,
    include_audio: bool,
) -> Result<String, SegmentError> {
    let cap = caps.for_model(&job.model);
    let prompt_text = job.effective_prompt(segment);
    let duration = cap.resolve_duration(segment.duration.unwrap_or(DEFAULT_DURATION_SECS));

    let start_uri = remote_reference(job, segment, FramePosition::Start, config_dir, uploads)?;
    let end_uri = if segment.has_end_frame() {
        Some(remote_reference(job, segment, FramePosition::End, config_dir, uploads)?)
    } else {
        None
    };

    if end_uri.is_some() && !cap.supports_end_frame {
        return Err(SegmentError::EndFrameUnsupported {
            model: job.model.clone(),
            alternatives: caps.end_frame_models().join(", "),
        });
    }

    let mut prompt_image = vec![PromptImage::first(start_uri)];
    if let Some(uri) = end_uri {
        prompt_image.push(PromptImage::last(uri));
    }

    let request = GenerationRequest {
        model: job.model.clone(),
        prompt_image,
        prompt_text,
        ratio: job.ratio.clone(),
        duration,
        include_audio: include_audio.then_some(true),
    };

    let task_id = service.create_video_task(&request).await?;
    let result = service.await_task(&task_id).await?;

    if result.status != TaskStatus::Succeeded {
        let reason = result
            .failure
            .unwrap_or_else(|| format!("task ended in state {:?}", result.status));
        return Err(SegmentError::TaskFailed { reason });
    }
    match result.output.into_iter().next() {
        Some(url) => Ok(url),
        None => Err(SegmentError::NoOutput),
    }
}
