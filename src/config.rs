use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::capability::{DEFAULT_MODEL, DEFAULT_RATIO};

fn default_image_dir() -> String {
    ".".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_ratio() -> String {
    DEFAULT_RATIO.to_string()
}

/// Whether an image reference anchors the start or the end of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePosition {
    Start,
    End,
}

/// One requested clip: a prompt, a duration, and one or two keyframe
/// references addressed either by index into `images` or by filename.
/// Fields stay optional here so validation can report every problem at once
/// instead of failing on the first bad field during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentSpec {
    pub prompt: Option<String>,
    pub duration: Option<f64>,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
    pub start_image: Option<String>,
    pub end_image: Option<String>,
}

impl SegmentSpec {
    /// True when the segment requests a last-frame keyframe in addition to
    /// the first.
    pub fn has_end_frame(&self) -> bool {
        self.end_index.is_some() || self.end_image.is_some()
    }

    pub fn uses_indices(&self) -> bool {
        self.start_index.is_some() || self.end_index.is_some()
    }
}

/// The job description, loaded once per run and read-only afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_ratio")]
    pub ratio: String,
    #[serde(default)]
    pub general_prompt: Option<String>,
}

impl JobConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read job config: {}", path.as_ref().display()))?;
        let config: JobConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse job config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// True when any segment addresses its keyframes by index. All segments
    /// of a job must then do the same; the validator reports the ones that
    /// do not.
    pub fn uses_indices(&self) -> bool {
        self.segments.iter().any(SegmentSpec::uses_indices)
    }

    /// `image_dir` resolved against the directory the config file lives in.
    pub fn image_dir_in(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.image_dir)
    }

    /// Filesystem path of a segment's start or end image, or `None` when the
    /// reference is absent or out of range (the validator reports those).
    pub fn frame_path(
        &self,
        segment: &SegmentSpec,
        position: FramePosition,
        config_dir: &Path,
    ) -> Option<PathBuf> {
        let name = if self.uses_indices() {
            let index = match position {
                FramePosition::Start => segment.start_index,
                FramePosition::End => segment.end_index,
            }?;
            if index < 0 {
                return None;
            }
            self.images.get(index as usize)?.clone()
        } else {
            match position {
                FramePosition::Start => segment.start_image.clone(),
                FramePosition::End => segment.end_image.clone(),
            }?
        };
        Some(self.image_dir_in(config_dir).join(name))
    }

    /// Combine the job-level general prompt with the segment prompt. The full
    /// string is sent to the API as the prompt text.
    pub fn effective_prompt(&self, segment: &SegmentSpec) -> String {
        let seg = segment.prompt.as_deref().unwrap_or("").trim();
        let general = self.general_prompt.as_deref().unwrap_or("").trim();
        if general.is_empty() {
            return seg.to_string();
        }
        if seg.is_empty() {
            return general.to_string();
        }
        format!("{general}. {seg}")
    }
}
