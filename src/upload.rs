use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::api::{ApiError, VideoService};
use crate::error::UploadError;
use crate::images::ResolvedImage;

/// Canonical path key -> remote reference URI. Complete before generation
/// starts, read-only afterwards.
pub type UploadMap = HashMap<String, String>;

/// Observer invoked after each upload completes, with (completed, total).
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Upload every unique image with at most `limit` requests in flight.
///
/// Every spawned upload is driven to completion even when siblings fail:
/// the set is fully drained before this returns, so no background work is
/// left orphaned. If anything failed, the aggregate error names every failed
/// image; a partial map is never returned.
pub async fn upload_all(
    service: Arc<dyn VideoService>,
    images: &[ResolvedImage],
    limit: usize,
    on_progress: Option<ProgressFn>,
) -> Result<UploadMap, UploadError> {
    let total = images.len();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut tasks: JoinSet<(String, Result<String, ApiError>)> = JoinSet::new();

    for image in images {
        let service = service.clone();
        let semaphore = semaphore.clone();
        let completed = completed.clone();
        let on_progress = on_progress.clone();
        let path = image.path.clone();
        let key = image.key.clone();
        tasks.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let result = match permit {
                Ok(_permit) => service.upload_image(&path).await,
                Err(_) => Err(ApiError::Io(std::io::Error::other("upload pool closed"))),
            };
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &on_progress {
                progress(done, total);
            }
            (key, result)
        });
    }

    let mut map = UploadMap::with_capacity(total);
    let mut failures: Vec<(String, ApiError)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, Ok(uri))) => {
                map.insert(key, uri);
            }
            Ok((key, Err(err))) => failures.push((key, err)),
            Err(join_err) => failures.push((
                "(upload worker)".to_string(),
                ApiError::Io(std::io::Error::other(join_err.to_string())),
            )),
        }
    }

    if failures.is_empty() {
        Ok(map)
    } else {
        failures.sort_by(|a, b| a.0.cmp(&b.0));
        Err(UploadError { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::MockService;
    use std::path::PathBuf;

    fn images(names: &[&str]) -> Vec<ResolvedImage> {
        names
            .iter()
            .map(|name| ResolvedImage {
                path: PathBuf::from(format!("/imgs/{name}")),
                key: format!("/imgs/{name}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn uploads_everything_and_reports_progress() {
        let service = Arc::new(MockService::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = seen.clone();
        let progress: ProgressFn = Arc::new(move |done, total| {
            assert!(done <= total);
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        });

        let imgs = images(&["a.png", "b.png", "c.png"]);
        let map = upload_all(service.clone(), &imgs, 2, Some(progress))
            .await
            .expect("uploads should succeed");

        assert_eq!(map.len(), 3);
        assert_eq!(map["/imgs/a.png"], "mock://upload/a.png");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(service.upload_calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.uploaded_paths().len(), 3);
    }

    #[tokio::test]
    async fn failures_are_aggregated_after_draining_all_tasks() {
        let service = Arc::new(MockService::failing_upload(&["b.png", "d.png"]));
        let imgs = images(&["a.png", "b.png", "c.png", "d.png"]);

        let err = upload_all(service.clone(), &imgs, 4, None)
            .await
            .expect_err("two uploads should fail");

        // Every task ran to completion before the error surfaced.
        assert_eq!(service.upload_calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.failures.len(), 2);
        let failed: Vec<_> = err.failures.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(failed, vec!["/imgs/b.png", "/imgs/d.png"]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_map() {
        let service = Arc::new(MockService::new());
        let map = upload_all(service.clone(), &[], 3, None).await.unwrap();
        assert!(map.is_empty());
        assert_eq!(service.upload_calls.load(Ordering::SeqCst), 0);
    }
}
