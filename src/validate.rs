use std::path::Path;

use crate::capability::{CapabilityTable, MAX_DURATION_SECS, MIN_DURATION_SECS};
use crate::config::{FramePosition, JobConfig, SegmentSpec};

/// Validate the whole job description against its files and the model's
/// constraints. Every check runs; nothing short-circuits, so the returned
/// list names every problem at once. Read-only: the filesystem is only
/// probed for existence.
pub fn validate_job(job: &JobConfig, config_dir: &Path, caps: &CapabilityTable) -> Vec<String> {
    let mut errors = Vec::new();

    if job.segments.is_empty() {
        errors.push("'segments' is missing or empty.".to_string());
    }

    let use_indices = job.uses_indices();
    if use_indices && job.images.is_empty() {
        errors.push("Using index-based segments but 'images' is missing or empty.".to_string());
    }

    for (i, segment) in job.segments.iter().enumerate() {
        errors.extend(validate_segment_schema(segment, i, job.images.len(), use_indices));
    }

    for (i, segment) in job.segments.iter().enumerate() {
        for (position, label) in [(FramePosition::Start, "start"), (FramePosition::End, "end")] {
            if position == FramePosition::End && !segment.has_end_frame() {
                continue;
            }
            if let Some(path) = job.frame_path(segment, position, config_dir) {
                if !path.is_file() {
                    errors.push(format!(
                        "Segment {i}: {label} image not found: {}",
                        path.display()
                    ));
                }
            }
        }
    }

    errors.extend(validate_model_support(job, caps));
    errors
}

fn validate_segment_schema(
    segment: &SegmentSpec,
    index: usize,
    images_len: usize,
    use_indices: bool,
) -> Vec<String> {
    let mut errors = Vec::new();

    if segment.prompt.is_none() {
        errors.push(format!("Segment {index}: missing 'prompt'."));
    }

    match segment.duration {
        None => errors.push(format!("Segment {index}: missing 'duration'.")),
        Some(d) if !d.is_finite() || d <= 0.0 => errors.push(format!(
            "Segment {index}: 'duration' must be a positive number, got {d}."
        )),
        Some(d) if d > MAX_DURATION_SECS as f64 => errors.push(format!(
            "Segment {index}: 'duration' {d} may exceed the service maximum ({MAX_DURATION_SECS}s)."
        )),
        Some(_) => {}
    }

    if use_indices {
        match segment.start_index {
            None => errors.push(format!(
                "Segment {index}: missing 'start_index' (when using indices)."
            )),
            Some(si) if si < 0 || si as usize >= images_len => errors.push(format!(
                "Segment {index}: invalid 'start_index' {si} (max {}).",
                images_len as i64 - 1
            )),
            Some(_) => {}
        }
        if segment.has_end_frame() {
            match segment.end_index {
                None => errors.push(format!(
                    "Segment {index}: has end frame but missing 'end_index'."
                )),
                Some(ei) if ei < 0 || ei as usize >= images_len => errors.push(format!(
                    "Segment {index}: invalid 'end_index' {ei} (max {}).",
                    images_len as i64 - 1
                )),
                Some(_) => {}
            }
        }
    } else {
        if segment.start_image.is_none() {
            errors.push(format!(
                "Segment {index}: missing 'start_image' (when using image names)."
            ));
        }
        if segment.has_end_frame() && segment.end_image.is_none() {
            errors.push(format!(
                "Segment {index}: has end frame but missing 'end_image'."
            ));
        }
    }

    errors
}

/// Model-capability checks: end-frame support, duration membership, ratio
/// membership. Kept separate so the generate path can re-run only this part.
pub fn validate_model_support(job: &JobConfig, caps: &CapabilityTable) -> Vec<String> {
    let mut errors = Vec::new();
    let cap = caps.for_model(&job.model);

    let any_end_frame = job.segments.iter().any(SegmentSpec::has_end_frame);
    if any_end_frame && !cap.supports_end_frame {
        errors.push(format!(
            "Model '{}' does not support first+last frame (only first frame). \
             Keyframe stitching requires first+last. Use one of: {}.",
            job.model,
            caps.end_frame_models().join(", ")
        ));
    }

    for (i, segment) in job.segments.iter().enumerate() {
        let Some(d) = segment.duration else { continue };
        if !d.is_finite() {
            continue;
        }
        let sec = d.round() as i64;
        match cap.durations {
            Some(allowed) => {
                if !allowed.iter().any(|&a| a as i64 == sec) {
                    errors.push(format!(
                        "Segment {i}: duration {d} is not allowed for model '{}'. Allowed: {allowed:?}.",
                        job.model
                    ));
                }
            }
            None => {
                if sec < MIN_DURATION_SECS as i64 || sec > MAX_DURATION_SECS as i64 {
                    errors.push(format!(
                        "Segment {i}: duration {d} outside {MIN_DURATION_SECS}-{MAX_DURATION_SECS} \
                         seconds for model '{}'.",
                        job.model
                    ));
                }
            }
        }
    }

    if let Some(allowed) = cap.ratios {
        if !allowed.contains(&job.ratio.as_str()) {
            errors.push(format!(
                "Ratio '{}' is not allowed for model '{}'. Allowed: {allowed:?}.",
                job.ratio, job.model
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn fixture(images: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for name in images {
            fs::write(dir.path().join(name), b"png").unwrap();
        }
        dir
    }

    fn job(json: serde_json::Value) -> JobConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn valid_job_has_no_errors() {
        let dir = fixture(&["a.png", "b.png"]);
        let job = job(serde_json::json!({
            "model": "veo3.1",
            "ratio": "1280:720",
            "images": ["a.png", "b.png"],
            "segments": [
                {"prompt": "one", "duration": 4, "start_index": 0, "end_index": 1},
                {"prompt": "two", "duration": 8, "start_index": 1}
            ],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn empty_segments_is_an_error() {
        let dir = fixture(&[]);
        let job = job(serde_json::json!({"segments": []}));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert_eq!(errors, vec!["'segments' is missing or empty.".to_string()]);
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "images": ["a.png"],
            "segments": [{"prompt": "p", "duration": 4, "start_index": 3}],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid 'start_index' 3"));
    }

    #[test]
    fn unrelated_violations_are_all_reported() {
        // A bad index and a bad ratio in one job: both must surface.
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "ratio": "640:480",
            "images": ["a.png"],
            "segments": [{"prompt": "p", "duration": 4, "start_index": 9}],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.iter().any(|e| e.contains("invalid 'start_index' 9")));
        assert!(errors.iter().any(|e| e.contains("Ratio '640:480'")));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn end_frame_on_first_frame_only_model() {
        let dir = fixture(&["a.png", "b.png"]);
        let job = job(serde_json::json!({
            "model": "gen4_turbo",
            "images": ["a.png", "b.png"],
            "segments": [
                {"prompt": "one", "duration": 4, "start_index": 0, "end_index": 1},
                {"prompt": "two", "duration": 4, "start_index": 1}
            ],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert_eq!(errors.len(), 1, "exactly one model-compatibility error: {errors:?}");
        assert!(errors[0].contains("does not support first+last frame"));
        assert!(errors[0].contains("gen3a_turbo"));
    }

    #[test]
    fn fixed_duration_set_is_enforced_on_rounded_values() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "model": "veo3.1",
            "images": ["a.png"],
            "segments": [
                {"prompt": "ok", "duration": 5.8, "start_index": 0},
                {"prompt": "bad", "duration": 5, "start_index": 0}
            ],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        // 5.8 rounds to 6 (allowed); 5 stays 5 (not allowed).
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Segment 1"));
        assert!(errors[0].contains("[4, 6, 8]"));
    }

    #[test]
    fn open_duration_models_use_generic_bounds() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "images": ["a.png"],
            "segments": [{"prompt": "p", "duration": 12, "start_index": 0}],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.iter().any(|e| e.contains("may exceed the service maximum")));
        assert!(errors.iter().any(|e| e.contains("outside 2-10 seconds")));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "images": ["a.png", "gone.png"],
            "segments": [{"prompt": "p", "duration": 4, "start_index": 0, "end_index": 1}],
        }));
        // gen4_turbo rejects end frames too, so expect that error alongside.
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.iter().any(|e| e.contains("end image not found") && e.contains("gone.png")));
    }

    #[test]
    fn name_mode_requires_start_image() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "segments": [{"prompt": "p", "duration": 4, "end_image": "a.png"}],
        }));
        // end_image without indices puts the job in name mode; start missing.
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.iter().any(|e| e.contains("missing 'start_image'")));
    }

    #[test]
    fn nonpositive_duration_is_rejected() {
        let dir = fixture(&["a.png"]);
        let job = job(serde_json::json!({
            "images": ["a.png"],
            "segments": [{"prompt": "p", "duration": -2, "start_index": 0}],
        }));
        let errors = validate_job(&job, dir.path(), &CapabilityTable::builtin());
        assert!(errors.iter().any(|e| e.contains("must be a positive number")));
    }
}
