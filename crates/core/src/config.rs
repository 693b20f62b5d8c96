use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::artifacts::PREVIEW_DIR;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathConfig,
    pub artifacts: ArtifactConfig,
    pub classifier: ClassifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub video_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub candidate_tags_file: PathBuf,
    pub exclusions_file: PathBuf,
    pub backup_dir: PathBuf,
}

impl PathConfig {
    /// Directory holding every generated thumbnail and clip.
    pub fn preview_dir(&self) -> PathBuf {
        self.artifact_dir.join(PREVIEW_DIR)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Prefix of the URLs handed out for generated artifacts.
    pub url_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<String>,
}

const ENV_PREFIX: &str = "VIDPREP";

/// Builds the configuration once: defaults, then a config file, then
/// `VIDPREP_*` environment variables (`__` separates nested keys, e.g.
/// `VIDPREP_PATHS__VIDEO_DIR`). A `.env` file is loaded first when present.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut settings = config::Config::builder()
        .set_default("paths.video_dir", "../public/videos")?
        .set_default("paths.artifact_dir", "../public/thumbnails")?
        .set_default("paths.ledger_file", "../public/tags.csv")?
        .set_default("paths.candidate_tags_file", "../public/selected_tags.csv")?
        .set_default("paths.exclusions_file", "../public/exclusions.csv")?
        .set_default("paths.backup_dir", "backup")?
        .set_default("artifacts.url_prefix", "/thumbnails")?
        .set_default("classifier.provider", "http")?
        .set_default("classifier.model", "openai/clip-vit-base-patch32")?
        .set_default("classifier.timeout_secs", 120)?
        .set_default("logging.file", "media_processing.log")?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
