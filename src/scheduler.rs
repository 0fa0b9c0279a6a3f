use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::api::VideoService;
use crate::capability::CapabilityTable;
use crate::config::JobConfig;
use crate::error::SegmentError;
use crate::output;
use crate::segment;
use crate::upload::UploadMap;

/// Phases a scheduled segment moves through. `Skipped` is decided before
/// scheduling and never enters the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPhase {
    Started,
    Downloading,
    Done,
    Failed,
}

/// Progress event emitted as a segment task changes phase. `elapsed` is
/// measured from the start of the whole run, matching what a user watching
/// a long job wants to see.
#[derive(Debug, Clone)]
pub struct SegmentEvent {
    pub index: usize,
    pub total: usize,
    pub phase: SegmentPhase,
    pub elapsed: Duration,
    /// Failure detail, present only for `Failed`.
    pub detail: Option<String>,
}

pub type EventFn = Arc<dyn Fn(SegmentEvent) + Send + Sync>;

/// Terminal record of one scheduled segment.
#[derive(Debug)]
pub struct SegmentResult {
    pub index: usize,
    pub outcome: Result<PathBuf, SegmentError>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub output_dir: PathBuf,
    pub skip_existing: bool,
    pub include_audio: bool,
    pub max_workers: usize,
}

/// Split segment indexes into (to_run, skipped). Skipping happens only in
/// skip-existing mode; a skipped segment consumes no worker slot and no
/// network call.
pub fn partition_segments(
    job: &JobConfig,
    output_dir: &Path,
    skip_existing: bool,
) -> (Vec<usize>, Vec<usize>) {
    let mut to_run = Vec::new();
    let mut skipped = Vec::new();
    for index in 0..job.segments.len() {
        if skip_existing && output::segment_exists(output_dir, index) {
            skipped.push(index);
        } else {
            to_run.push(index);
        }
    }
    (to_run, skipped)
}

/// Runs segment pipelines under a bounded worker pool. Each segment's own
/// steps are sequential; distinct segments run fully concurrently sharing
/// only the read-only upload map. One segment's failure never cancels or
/// blocks another.
pub struct Scheduler {
    service: Arc<dyn VideoService>,
    caps: Arc<CapabilityTable>,
    job: Arc<JobConfig>,
    config_dir: PathBuf,
    uploads: Arc<UploadMap>,
    opts: SchedulerOptions,
    on_event: Option<EventFn>,
}

impl Scheduler {
    pub fn new(
        service: Arc<dyn VideoService>,
        caps: Arc<CapabilityTable>,
        job: Arc<JobConfig>,
        config_dir: PathBuf,
        uploads: Arc<UploadMap>,
        opts: SchedulerOptions,
        on_event: Option<EventFn>,
    ) -> Self {
        Self {
            service,
            caps,
            job,
            config_dir,
            uploads,
            opts,
            on_event,
        }
    }

    /// Drive every index in `to_run` to a terminal state and return one
    /// result per index, sorted by segment index. Completed outputs stay on
    /// disk regardless of sibling failures.
    pub async fn run(&self, to_run: &[usize]) -> Vec<SegmentResult> {
        let total = self.job.segments.len();
        let run_start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.opts.max_workers.max(1)));
        let mut tasks: JoinSet<SegmentResult> = JoinSet::new();
        let mut index_of_task: HashMap<tokio::task::Id, usize> = HashMap::new();

        for &index in to_run {
            // Destinations are pre-computed so concurrent tasks never contend
            // for the same path. Versioned naming applies when regenerating.
            let dest = output::output_path(&self.opts.output_dir, index, !self.opts.skip_existing);
            let service = self.service.clone();
            let caps = self.caps.clone();
            let job = self.job.clone();
            let config_dir = self.config_dir.clone();
            let uploads = self.uploads.clone();
            let semaphore = semaphore.clone();
            let on_event = self.on_event.clone();
            let include_audio = self.opts.include_audio;

            let handle = tasks.spawn(async move {
                let emit = |phase: SegmentPhase, detail: Option<String>| {
                    if let Some(on_event) = &on_event {
                        on_event(SegmentEvent {
                            index,
                            total,
                            phase,
                            elapsed: run_start.elapsed(),
                            detail,
                        });
                    }
                };

                let task_start = Instant::now();
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SegmentResult {
                            index,
                            outcome: Err(SegmentError::TaskFailed {
                                reason: "worker pool closed".to_string(),
                            }),
                            elapsed: task_start.elapsed(),
                        };
                    }
                };

                emit(SegmentPhase::Started, None);
                let outcome = async {
                    let url = segment::generate_segment(
                        service.as_ref(),
                        &caps,
                        &job,
                        &config_dir,
                        &job.segments[index],
                        &uploads,
                        include_audio,
                    )
                    .await?;
                    emit(SegmentPhase::Downloading, None);
                    service
                        .download(&url, &dest)
                        .await
                        .map_err(SegmentError::Transfer)?;
                    Ok::<PathBuf, SegmentError>(dest)
                }
                .await;
                drop(permit);

                match &outcome {
                    Ok(_) => emit(SegmentPhase::Done, None),
                    Err(err) => emit(SegmentPhase::Failed, Some(err.to_string())),
                }
                SegmentResult {
                    index,
                    outcome,
                    elapsed: task_start.elapsed(),
                }
            });
            index_of_task.insert(handle.id(), index);
        }

        let mut results = Vec::with_capacity(to_run.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(join_err) => {
                    // A panicked task still yields a per-segment failure so
                    // the aggregate stays complete.
                    let index = index_of_task.get(&join_err.id()).copied().unwrap_or(0);
                    results.push(SegmentResult {
                        index,
                        outcome: Err(SegmentError::TaskFailed {
                            reason: format!("segment task aborted: {join_err}"),
                        }),
                        elapsed: run_start.elapsed(),
                    });
                }
            }
        }
        results.sort_by_key(|r| r.index);
        results
    }
}
