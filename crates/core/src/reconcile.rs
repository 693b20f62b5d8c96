//! Removes ledger rows and preview files whose video is gone from the scan.
//!
//! Both operations trust the id set they are given; deciding whether a scan
//! is trustworthy is the caller's job.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use storage::TagRecord;

use crate::artifacts::{CLIP_EXT, THUMBNAIL_SUFFIX};
use crate::report::Reporter;

/// Keeps only records whose `media_id` is in `ids`. Returns the kept records
/// and the number removed.
pub fn prune_ledger(
    records: Vec<TagRecord>,
    ids: &HashSet<String>,
    reporter: &Reporter,
) -> (Vec<TagRecord>, usize) {
    reporter.info("Cleaning orphaned tags...");
    let mut removed = 0usize;
    let retained: Vec<TagRecord> = records
        .into_iter()
        .filter(|r| {
            let keep = ids.contains(&r.media_id);
            if !keep {
                reporter.warn(format!("Removed orphaned tag for video:{}", r.media_id));
                removed += 1;
            }
            keep
        })
        .collect();
    reporter.success(format!(
        "Cleaned {removed} orphaned tags, {} tags retained",
        retained.len()
    ));
    (retained, removed)
}

/// The video id a preview file belongs to: `<id>.gif` or `<id>_thumb.<ext>`.
pub fn artifact_owner(file_name: &Path) -> Option<String> {
    let stem = file_name.file_stem()?.to_str()?;
    let ext = file_name.extension().and_then(|e| e.to_str());
    let id = if ext == Some(CLIP_EXT) {
        stem
    } else {
        stem.strip_suffix(THUMBNAIL_SUFFIX).unwrap_or(stem)
    };
    Some(id.to_string())
}

/// Deletes preview files whose owner is not in `ids`. Returns how many were removed.
pub fn prune_artifacts(preview_dir: &Path, ids: &HashSet<String>, reporter: &Reporter) -> usize {
    reporter.info("Cleaning orphaned thumbnails and clips...");
    let entries = match fs::read_dir(preview_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            reporter.error(format!(
                "Unexpected error during thumbnail cleanup of {}: {e}",
                preview_dir.display()
            ));
            return 0;
        }
    };

    let mut removed = 0usize;
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let Some(owner) = artifact_owner(Path::new(&entry.file_name())) else {
            continue;
        };
        if ids.contains(&owner) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                reporter.success(format!("Removed orphaned file: {}", path.display()));
                removed += 1;
            }
            Err(e) => reporter.error(format!("Failed to remove {}: {e}", path.display())),
        }
    }
    reporter.success(format!("Cleaned {removed} orphaned files"));
    removed
}
