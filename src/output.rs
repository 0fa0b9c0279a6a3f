use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Path, PathBuf};

fn versioned_name_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^seg_(\d{3})_v(\d+)\.mp4$").unwrap())
}

pub fn canonical_name(index: usize) -> String {
    format!("seg_{index:03}.mp4")
}

/// Versions already on disk for a segment index, with their paths. Names
/// whose version part is not numeric are ignored, not fatal.
fn existing_versions(output_dir: &Path, index: usize) -> Vec<(u32, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut versions = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(caps) = versioned_name_re().captures(name) else {
            continue;
        };
        let Some(file_index) = caps[1].parse::<usize>().ok() else {
            continue;
        };
        if file_index != index {
            continue;
        }
        if let Ok(version) = caps[2].parse::<u32>() {
            versions.push((version, entry.path()));
        }
    }
    versions
}

/// True when this segment already has an output file, canonical or versioned.
/// Used in skip-existing mode to avoid rescheduling finished work.
pub fn segment_exists(output_dir: &Path, index: usize) -> bool {
    if output_dir.join(canonical_name(index)).is_file() {
        return true;
    }
    !existing_versions(output_dir, index).is_empty()
}

/// Destination path for a segment about to be generated. In versioned mode
/// the next version is max(existing) + 1; gaps are never reused, so old
/// outputs are superseded rather than overwritten.
pub fn output_path(output_dir: &Path, index: usize, versioned: bool) -> PathBuf {
    if !versioned {
        return output_dir.join(canonical_name(index));
    }
    let next = existing_versions(output_dir, index)
        .iter()
        .map(|(version, _)| *version)
        .max()
        .unwrap_or(0)
        + 1;
    output_dir.join(format!("seg_{index:03}_v{next}.mp4"))
}

/// Best existing file for a segment index: the canonical name when present,
/// otherwise the highest version. Used by the stitch stage.
pub fn resolve_existing(output_dir: &Path, index: usize) -> Option<PathBuf> {
    let canonical = output_dir.join(canonical_name(index));
    if canonical.is_file() {
        return Some(canonical);
    }
    existing_versions(output_dir, index)
        .into_iter()
        .max_by_key(|(version, _)| *version)
        .map(|(_, path)| path)
}
