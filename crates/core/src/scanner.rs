use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::models::VideoAsset;
use crate::report::Reporter;

/// Container formats picked up by the scanner (matched case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("video directory {0} does not exist")]
    MissingRoot(PathBuf),
    #[error("failed to read video directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid extension pattern: {0}")]
    Pattern(#[from] globset::Error),
}

pub fn scan(root: &Path, reporter: &Reporter) -> Result<Vec<VideoAsset>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }
    let videos = build_globset(&VIDEO_EXTENSIONS)?;

    let mut found: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(ScanError::Unreadable {
                    path: root.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                reporter.warn(format!("Skipping unreadable entry under {}: {e}", root.display()));
                continue;
            }
        };
        if !entry.file_type().is_file() || !videos.is_match(entry.file_name()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            found.push(rel.to_path_buf());
        }
    }

    found.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    let mut assets = Vec::with_capacity(found.len());
    for rel in found {
        let shown = rel.display().to_string();
        match VideoAsset::new(rel) {
            Some(asset) => assets.push(asset),
            None => reporter.warn(format!(
                "Skipping {shown}: file name is not valid UTF-8 and cannot be used as a media id"
            )),
        }
    }
    reporter.info(format!("Found {} videos", assets.len()));
    Ok(assets)
}

fn build_globset(extensions: &[&str]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let glob = GlobBuilder::new(&format!("*.{ext}"))
            .case_insensitive(true)
            .build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
