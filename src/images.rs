use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{FramePosition, JobConfig};

/// An image some segment actually references, with the key uploads are
/// deduplicated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    pub key: String,
}

/// Canonicalized absolute-path string. Two references to the same file (via
/// different relative spellings or symlinks) share one key and therefore one
/// upload.
pub fn canonical_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Unique images referenced by the job's segments, in first-encounter order
/// (segment order as declared, start reference before end reference).
/// Determinism keeps repeated runs uploading the same set in the same order.
/// Missing files are the validator's problem; paths may be assumed to exist.
pub fn collect_unique_images(job: &JobConfig, config_dir: &Path) -> Vec<ResolvedImage> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for segment in &job.segments {
        let mut positions = vec![FramePosition::Start];
        if segment.has_end_frame() {
            positions.push(FramePosition::End);
        }
        for position in positions {
            let Some(path) = job.frame_path(segment, position, config_dir) else {
                continue;
            };
            let key = canonical_key(&path);
            if seen.insert(key.clone()) {
                out.push(ResolvedImage {
                    path: PathBuf::from(&key),
                    key,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn job_with_images(images: &[&str], segments: serde_json::Value) -> JobConfig {
        let json = serde_json::json!({
            "images": images,
            "segments": segments,
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn shared_image_uploads_once() {
        let dir = tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            fs::write(dir.path().join(name), b"png").unwrap();
        }
        // Two segments share a.png; each brings one distinct second image.
        let job = job_with_images(
            &["a.png", "b.png", "c.png"],
            serde_json::json!([
                {"prompt": "one", "duration": 4, "start_index": 0, "end_index": 1},
                {"prompt": "two", "duration": 4, "start_index": 0, "end_index": 2}
            ]),
        );

        let unique = collect_unique_images(&job, dir.path());
        assert_eq!(unique.len(), 3);
        let names: Vec<_> = unique
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn start_only_segments_skip_end_reference() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("solo.png"), b"png").unwrap();
        let job = job_with_images(
            &["solo.png"],
            serde_json::json!([{"prompt": "p", "duration": 4, "start_index": 0}]),
        );
        let unique = collect_unique_images(&job, dir.path());
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn name_mode_resolves_through_image_dir() {
        let dir = tempdir().unwrap();
        let imgs = dir.path().join("imgs");
        fs::create_dir(&imgs).unwrap();
        fs::write(imgs.join("x.png"), b"png").unwrap();
        let job: JobConfig = serde_json::from_value(serde_json::json!({
            "image_dir": "imgs",
            "segments": [{"prompt": "p", "duration": 4, "start_image": "x.png"}],
        }))
        .unwrap();
        let unique = collect_unique_images(&job, dir.path());
        assert_eq!(unique.len(), 1);
        assert!(unique[0].key.ends_with("x.png"));
    }
}
