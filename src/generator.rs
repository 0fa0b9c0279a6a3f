use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::api::{RunwayClient, VideoService};
use crate::capability::CapabilityTable;
use crate::config::JobConfig;
use crate::images;
use crate::init;
use crate::scheduler::{EventFn, Scheduler, SchedulerOptions, SegmentPhase, partition_segments};
use crate::upload::{self, ProgressFn};
use crate::validate;

// Image uploads are small and fast; more parallelism than this only trips
// rate limits.
const UPLOAD_CONCURRENCY_CAP: usize = 8;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub skip_existing: bool,
    pub include_audio: bool,
    pub max_workers: usize,
}

pub async fn load_job(config_path: &Path) -> Result<(JobConfig, PathBuf)> {
    let config_path = std::fs::canonicalize(config_path)
        .with_context(|| format!("Config not found: {}", config_path.display()))?;
    let config_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let job = JobConfig::load(&config_path).await?;
    Ok((job, config_dir))
}

/// Check the job description and print every problem it has. Exit code 0
/// when clean, 1 otherwise.
pub async fn run_validate(config_path: &Path) -> Result<i32> {
    let (job, config_dir) = load_job(config_path).await?;
    let caps = CapabilityTable::builtin();
    let errors = validate::validate_job(&job, &config_dir, &caps);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{error}");
        }
        return Ok(1);
    }
    println!("Config is valid.");
    Ok(0)
}

/// The full generation pipeline: validate, resolve and upload unique images,
/// then run segment generation under a bounded worker pool. Returns the
/// process exit code.
pub async fn run_generate(config_path: &Path, opts: GenerateOptions) -> Result<i32> {
    let (job, config_dir) = load_job(config_path).await?;
    let caps = CapabilityTable::builtin();

    info!("validating job config");
    let errors = validate::validate_job(&job, &config_dir, &caps);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{error}");
        }
        return Ok(1);
    }
    info!("config and model support OK");

    tokio::fs::create_dir_all(&opts.output_dir)
        .await
        .with_context(|| format!("Failed to create output dir {}", opts.output_dir.display()))?;

    let total = job.segments.len();
    let (to_run, skipped) = partition_segments(&job, &opts.output_dir, opts.skip_existing);
    for &index in &skipped {
        info!("segment {}/{total} skipped (output already exists)", index + 1);
    }
    if to_run.is_empty() {
        info!(
            "all segments already generated; use --no-skip-existing to regenerate \
             (writes versioned files)"
        );
        return Ok(0);
    }
    info!("segments to generate: {}/{total}", to_run.len());

    let Some(secret) = init::api_secret() else {
        eprintln!("Set RUNWAYML_API_SECRET in environment (or .env).");
        return Ok(1);
    };
    let service: Arc<dyn VideoService> = Arc::new(RunwayClient::new(secret)?);

    let unique_images = images::collect_unique_images(&job, &config_dir);
    info!("uploading {} unique images", unique_images.len());
    let upload_progress: ProgressFn =
        Arc::new(|done, total| info!("uploaded {done}/{total} images"));
    let uploads = upload::upload_all(
        service.clone(),
        &unique_images,
        opts.max_workers.clamp(1, UPLOAD_CONCURRENCY_CAP),
        Some(upload_progress),
    )
    .await?;

    let run_start = Instant::now();
    let on_event: EventFn = Arc::new(|ev| {
        let n = ev.index + 1;
        let total = ev.total;
        let secs = ev.elapsed.as_secs();
        match ev.phase {
            SegmentPhase::Started => info!("segment {n}/{total}: started ({secs}s elapsed)"),
            SegmentPhase::Downloading => {
                info!("segment {n}/{total}: generation done, downloading... ({secs}s)")
            }
            SegmentPhase::Done => info!("segment {n}/{total}: complete ({secs}s)"),
            SegmentPhase::Failed => warn!(
                "segment {n}/{total} failed: {}",
                ev.detail.as_deref().unwrap_or("unknown error")
            ),
        }
    });

    let scheduler = Scheduler::new(
        service,
        Arc::new(caps),
        Arc::new(job),
        config_dir,
        Arc::new(uploads),
        SchedulerOptions {
            output_dir: opts.output_dir.clone(),
            skip_existing: opts.skip_existing,
            include_audio: opts.include_audio,
            max_workers: opts.max_workers.max(1),
        },
        Some(on_event),
    );
    let results = scheduler.run(&to_run).await;

    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    if failed > 0 {
        eprintln!("{failed} segment(s) failed.");
        return Ok(1);
    }
    info!(
        "all requested segments saved in {} (total {}s)",
        opts.output_dir.display(),
        run_start.elapsed().as_secs()
    );
    Ok(0)
}
