use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A video found by the scanner. Rebuilt every run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAsset {
    pub id: String,
    pub relative_path: PathBuf,
    /// Seconds; 0 until probed or when probing failed.
    pub duration: f64,
}

impl VideoAsset {
    pub fn new(relative_path: PathBuf) -> Option<Self> {
        let id = video_id(&relative_path)?;
        Some(Self {
            id,
            relative_path,
            duration: 0.0,
        })
    }
}

/// The id of a video is its file name without the extension.
pub fn video_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub url: String,
}

/// Thumbnail and preview clip for one video; `None` means the file is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactPair {
    pub thumbnail: Option<ArtifactRef>,
    pub clip: Option<ArtifactRef>,
}

impl ArtifactPair {
    pub fn is_complete(&self) -> bool {
        self.thumbnail.is_some() && self.clip.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub generate_artifacts: bool,
    pub generate_tags: bool,
    pub clear_cache: bool,
}
