//! Backup-then-clear of the preview directory and the tag ledger.
//!
//! Nothing is deleted unless a complete, verified backup exists first.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::PathConfig;
use crate::report::Reporter;

pub const BACKUP_THUMBNAILS_DIR: &str = "thumbnails";
pub const BACKUP_LEDGER_FILE: &str = "tags.csv";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backup failed while {context}: {source}")]
    Backup {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("backup verification failed: {0}")]
    Verify(String),
    #[error("failed to clear {path}: {source}")]
    Clear {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn backup(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Backup { context, source }
    }

    /// True when the failure happened before anything was deleted.
    pub fn nothing_deleted(&self) -> bool {
        !matches!(self, CacheError::Clear { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBackup {
    pub root: PathBuf,
    pub thumbnails: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
}

/// Backs up, then clears. The clear step only runs after a verified backup.
pub fn backup_and_clear(paths: &PathConfig, reporter: &Reporter) -> Result<CacheBackup, CacheError> {
    reporter.info("Initiating cache clearing...");
    let backup = create_backup(paths, Local::now(), reporter)?;
    clear(paths, reporter)?;
    Ok(backup)
}

pub fn create_backup(
    paths: &PathConfig,
    now: DateTime<Local>,
    reporter: &Reporter,
) -> Result<CacheBackup, CacheError> {
    let root = snapshot_dir(&paths.backup_dir, now)?;

    let preview = paths.preview_dir();
    let thumbnails = if preview.is_dir() {
        let dest = root.join(BACKUP_THUMBNAILS_DIR);
        copy_tree(&preview, &dest)?;
        verify_tree(&preview, &dest)?;
        reporter.success(format!(
            "Backed up thumbnails and clips to {}",
            dest.display()
        ));
        Some(dest)
    } else {
        None
    };

    let ledger = if paths.ledger_file.is_file() {
        let dest = root.join(BACKUP_LEDGER_FILE);
        fs::copy(&paths.ledger_file, &dest).map_err(CacheError::backup(format!(
            "copying {}",
            paths.ledger_file.display()
        )))?;
        verify_file(&paths.ledger_file, &dest)?;
        reporter.success(format!(
            "Backed up {} to {}",
            paths.ledger_file.display(),
            dest.display()
        ));
        Some(dest)
    } else {
        None
    };

    Ok(CacheBackup {
        root,
        thumbnails,
        ledger,
    })
}

/// Deletes the preview directory (recreated empty) and the ledger file.
pub fn clear(paths: &PathConfig, reporter: &Reporter) -> Result<(), CacheError> {
    let preview = paths.preview_dir();
    if preview.exists() {
        fs::remove_dir_all(&preview).map_err(|source| CacheError::Clear {
            path: preview.clone(),
            source,
        })?;
        reporter.success(format!(
            "Cleared thumbnail and clip cache: {}",
            preview.display()
        ));
    }
    if paths.ledger_file.exists() {
        fs::remove_file(&paths.ledger_file).map_err(|source| CacheError::Clear {
            path: paths.ledger_file.clone(),
            source,
        })?;
        reporter.success(format!("Cleared tags cache: {}", paths.ledger_file.display()));
    }
    fs::create_dir_all(&preview).map_err(|source| CacheError::Clear {
        path: preview.clone(),
        source,
    })?;
    Ok(())
}

/// Creates `backup_<YYYYMMDD_HHMMSS>` (suffixed `_n` on collision) under `base`.
fn snapshot_dir(base: &Path, now: DateTime<Local>) -> Result<PathBuf, CacheError> {
    fs::create_dir_all(base).map_err(CacheError::backup(format!(
        "creating {}",
        base.display()
    )))?;
    let stamp = format!("backup_{}", now.format("%Y%m%d_%H%M%S"));
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{stamp}_{attempt}")
        };
        let candidate = base.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(CacheError::Backup {
                    context: format!("creating {}", candidate.display()),
                    source: e,
                })
            }
        }
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), CacheError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| CacheError::Backup {
            context: format!("reading {}", src.display()),
            source: e.into(),
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(CacheError::backup(format!("creating {}", target.display())))?;
        } else {
            fs::copy(entry.path(), &target).map_err(CacheError::backup(format!(
                "copying {}",
                entry.path().display()
            )))?;
        }
    }
    Ok(())
}

fn verify_tree(src: &Path, dest: &Path) -> Result<(), CacheError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| CacheError::Verify(e.to_string()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        verify_file(entry.path(), &dest.join(rel))?;
    }
    Ok(())
}

fn verify_file(src: &Path, copy: &Path) -> Result<(), CacheError> {
    let expected = fs::metadata(src)
        .map_err(|e| CacheError::Verify(format!("{}: {e}", src.display())))?
        .len();
    let actual = fs::metadata(copy)
        .map_err(|e| CacheError::Verify(format!("{}: {e}", copy.display())))?
        .len();
    if expected != actual {
        return Err(CacheError::Verify(format!(
            "{} has {actual} bytes, expected {expected}",
            copy.display()
        )));
    }
    Ok(())
}
