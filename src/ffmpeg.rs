use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

use tracing::warn;

// atempo accepts factors in [0.5, 2.0] per filter instance; wider factors
// are expressed as a chain.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

pub async fn ffprobe_dimensions(path: &Path) -> Result<(i32, i32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut parts = text.split('x');
    let w = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    let h = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);

    if w <= 0 || h <= 0 {
        return Err(anyhow::anyhow!("Invalid dimensions"));
    }

    Ok((w, h))
}

pub async fn ffprobe_has_audio(path: &Path) -> Result<bool> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

/// Concatenate the listed clips without re-encoding. `include_audio` keeps
/// the source audio; the default strips it, since generated segment audio
/// rarely joins cleanly.
pub async fn ffmpeg_concat_videos(
    list_txt: &Path,
    out_mp4: &Path,
    include_audio: bool,
) -> Result<bool> {
    let mut args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
    ];
    if !include_audio {
        args.push("-an".to_string());
    }
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Break a playback factor into atempo steps the filter accepts.
/// Returns None for factors that are not positive.
pub fn atempo_chain(speed: f64) -> Option<Vec<f64>> {
    if !speed.is_finite() || speed <= 0.0 {
        return None;
    }
    let mut chain = Vec::new();
    let mut rest = speed;
    while rest > ATEMPO_MAX {
        chain.push(ATEMPO_MAX);
        rest /= ATEMPO_MAX;
    }
    while rest < ATEMPO_MIN {
        chain.push(ATEMPO_MIN);
        rest /= ATEMPO_MIN;
    }
    chain.push(rest);
    Some(chain)
}

fn atempo_filter(speed: f64) -> Option<String> {
    let steps = atempo_chain(speed)?;
    Some(
        steps
            .iter()
            .map(|s| format!("atempo={s:.6}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Re-time a clip to `speed`x playback. Audio is sped to match when the
/// input has an audio stream.
pub async fn ffmpeg_speed_up(in_mp4: &Path, out_mp4: &Path, speed: f64) -> Result<bool> {
    let Some(audio_filter) = atempo_filter(speed) else {
        warn!("invalid speed factor {speed}; skipping");
        return Ok(false);
    };
    let has_audio = ffprobe_has_audio(in_mp4).await.unwrap_or(false);

    let mut args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        in_mp4.display().to_string(),
    ];
    if has_audio {
        args.extend([
            "-filter_complex".to_string(),
            format!("[0:v]setpts=PTS/{speed:.10}[v];[0:a]{audio_filter}[a]"),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "[a]".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);
    } else {
        args.extend([
            "-filter_complex".to_string(),
            format!("[0:v]setpts=PTS/{speed:.10}[v]"),
            "-map".to_string(),
            "[v]".to_string(),
            "-an".to_string(),
        ]);
    }
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Scale an image to exact pixel dimensions. The resampling itself is
/// ffmpeg's business.
pub async fn ffmpeg_scale_image(
    source: &Path,
    width: i32,
    height: i32,
    out_path: &Path,
) -> Result<bool> {
    let args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        source.display().to_string(),
        "-vf".to_string(),
        format!("scale={width}:{height}"),
        out_path.display().to_string(),
    ];
    run_cmd(&args).await?;
    Ok(out_path.exists())
}
