//! Post-generation flows: stitching segment clips into one video, changing
//! playback speed, and matching an image's dimensions to a reference.

use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::JobConfig;
use crate::ffmpeg;
use crate::output;

/// Concatenate the job's segment clips, in segment order, into one file.
/// For each index the canonical file is preferred, else the latest version.
/// Audio is stripped unless `include_audio`.
pub async fn stitch_segments(
    job: &JobConfig,
    segments_dir: &Path,
    out_path: &Path,
    include_audio: bool,
) -> Result<()> {
    if job.segments.is_empty() {
        bail!("No segments in config.");
    }

    let mut clip_paths: Vec<PathBuf> = Vec::with_capacity(job.segments.len());
    for index in 0..job.segments.len() {
        match output::resolve_existing(segments_dir, index) {
            Some(path) => clip_paths.push(path),
            None => bail!(
                "Missing segment file for segment {index} ({} or seg_{index:03}_v*.mp4)",
                output::canonical_name(index)
            ),
        }
    }

    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // The concat demuxer reads clip paths from a list file.
    let mut list = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .context("Failed to create concat list")?;
    for path in &clip_paths {
        writeln!(list, "file '{}'", path.display())?;
    }
    list.flush()?;

    info!(
        "stitching {} clips to {}",
        clip_paths.len(),
        out_path.display()
    );
    if !ffmpeg::ffmpeg_concat_videos(list.path(), out_path, include_audio).await? {
        bail!("ffmpeg concat failed");
    }
    Ok(())
}

/// Re-time a video to `speed`x. Default output sits next to the input with a
/// `_fast` suffix.
pub async fn speed_up(input: &Path, output: Option<&Path>, speed: f64) -> Result<PathBuf> {
    if !input.is_file() {
        bail!("Input file not found: {}", input.display());
    }
    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_fast_name(input),
    };
    info!("speeding up {} by {speed}x", input.display());
    if !ffmpeg::ffmpeg_speed_up(input, &out_path, speed).await? {
        bail!("ffmpeg speed-up failed");
    }
    Ok(out_path)
}

fn default_fast_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    input.with_file_name(format!("{stem}_fast.{ext}"))
}

/// Scale `source` to the exact pixel dimensions of `reference`. Writes over
/// the source when no output path is given, mirroring how keyframe pairs are
/// usually fixed up in place.
pub async fn scale_image_to_match(
    source: &Path,
    reference: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    if !source.is_file() {
        bail!("Source image not found: {}", source.display());
    }
    if !reference.is_file() {
        bail!("Reference image not found: {}", reference.display());
    }
    let (width, height) = ffmpeg::ffprobe_dimensions(reference).await?;
    let out_path = output.unwrap_or(source).to_path_buf();
    info!(
        "scaling {} to {width}x{height} -> {}",
        source.display(),
        out_path.display()
    );
    if !ffmpeg::ffmpeg_scale_image(source, width, height, &out_path).await? {
        bail!("ffmpeg scale failed");
    }
    Ok(out_path)
}
