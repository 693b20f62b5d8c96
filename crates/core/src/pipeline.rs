use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use storage::TagRecord;
use thiserror::Error;
use tracing::debug;

use crate::artifacts::ArtifactGenerator;
use crate::cache::{self, CacheError};
use crate::candidates::{load_candidate_tags, CandidateTagSet};
use crate::classifier::{ClassifierLoader, ConfiguredClassifier, TagClassifier};
use crate::config::AppConfig;
use crate::models::{ArtifactPair, RunOptions, VideoAsset};
use crate::probe::{probe_duration, DurationProbe, FfprobeDurationProbe};
use crate::reconcile::{prune_artifacts, prune_ledger};
use crate::report::Reporter;
use crate::scanner;
use crate::transcode::{FfmpegTranscoder, GenerationError, Transcoder};

/// Videos shorter than this never get artifacts or tags.
pub const MIN_DURATION_SECS: f64 = 5.0;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cache clearing aborted: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Configuring,
    Scanning,
    ClearingCache,
    LoadingModels,
    ReconcilingArtifacts,
    ProcessingVideos,
    ReconcilingLedger,
    PersistingLedger,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Configuring => "configuring",
            RunStage::Scanning => "scanning",
            RunStage::ClearingCache => "clearing-cache",
            RunStage::LoadingModels => "loading-models",
            RunStage::ReconcilingArtifacts => "reconciling-artifacts",
            RunStage::ProcessingVideos => "processing-videos",
            RunStage::ReconcilingLedger => "reconciling-ledger",
            RunStage::PersistingLedger => "persisting-ledger",
            RunStage::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    TooShort(f64),
    /// Generation is disabled and the thumbnail or clip is not on disk.
    ArtifactsMissing,
}

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("thumbnail generation failed: {0}")]
    Thumbnail(#[source] GenerationError),
    #[error("preview clip generation failed: {0}")]
    Clip(#[source] GenerationError),
}

/// Where one video ended up. Failures stay inside the video.
#[derive(Debug)]
pub enum VideoOutcome {
    /// Artifacts are in place; carries a new ledger row when tags were produced.
    Recorded(Option<TagRecord>),
    Skipped(SkipReason),
    Failed(VideoError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub tagged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pruned_artifacts: usize,
    pub pruned_ledger_rows: usize,
    pub ledger_rows_written: usize,
    pub backup: Option<PathBuf>,
    pub elapsed_secs: f64,
    pub warnings: usize,
    pub errors: usize,
    /// False when the scan failed or found nothing; pruning is skipped then.
    pub scan_trusted: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &VideoOutcome) {
        match outcome {
            VideoOutcome::Recorded(row) => {
                self.completed += 1;
                if row.is_some() {
                    self.tagged += 1;
                }
            }
            VideoOutcome::Skipped(_) => self.skipped += 1,
            VideoOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Per-run tagging state: vocabulary, model, and ids already in the ledger.
struct Tagging {
    candidates: CandidateTagSet,
    classifier: TagClassifier,
    known: HashSet<String>,
}

pub struct Pipeline {
    config: AppConfig,
    probe: Arc<dyn DurationProbe>,
    artifacts: ArtifactGenerator,
    classifier_loader: Arc<dyn ClassifierLoader>,
    reporter: Reporter,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        probe: Arc<dyn DurationProbe>,
        transcoder: Arc<dyn Transcoder>,
        classifier_loader: Arc<dyn ClassifierLoader>,
        reporter: Reporter,
    ) -> Self {
        let artifacts = ArtifactGenerator::new(
            config.paths.preview_dir(),
            config.artifacts.url_prefix.clone(),
            transcoder,
        );
        Self {
            config,
            probe,
            artifacts,
            classifier_loader,
            reporter,
            progress: ProgressBar::hidden(),
        }
    }

    /// Advance `progress` once per video; its length is set when the scan finishes.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// ffprobe, ffmpeg and the configured classifier provider.
    pub fn with_defaults(config: AppConfig, reporter: Reporter) -> Self {
        let loader = Arc::new(ConfiguredClassifier::new(config.classifier.clone()));
        Self::new(
            config,
            Arc::new(FfprobeDurationProbe::default()),
            Arc::new(FfmpegTranscoder::default()),
            loader,
            reporter,
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn enter(&self, stage: RunStage) {
        debug!(scope = self.reporter.scope(), %stage, "entering stage");
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let reporter = &self.reporter;
        let (warnings_before, errors_before) = (reporter.warnings(), reporter.errors());
        let paths = &self.config.paths;

        self.enter(RunStage::Configuring);
        reporter.info("Starting media processing...");
        reporter.info(format!(
            "Configuration: Thumbnails/GIFs={}, Tags={}, Clear Cache={}",
            options.generate_artifacts, options.generate_tags, options.clear_cache
        ));

        self.enter(RunStage::Scanning);
        let (mut videos, scan_trusted) = match scanner::scan(&paths.video_dir, &reporter.scoped("scanner")) {
            Ok(videos) => {
                let trusted = !videos.is_empty();
                (videos, trusted)
            }
            Err(e) => {
                reporter.error(format!("Error scanning videos: {e}"));
                (Vec::new(), false)
            }
        };
        if !scan_trusted {
            reporter.warn("No videos found; orphan cleanup is disabled for this run");
        }
        let ids: HashSet<String> = videos.iter().map(|v| v.id.clone()).collect();

        let mut summary = RunSummary {
            total: videos.len(),
            scan_trusted,
            ..RunSummary::default()
        };

        let cleared = if options.clear_cache {
            self.enter(RunStage::ClearingCache);
            let backup = cache::backup_and_clear(paths, &reporter.scoped("cache")).map_err(|e| {
                reporter.error(format!("Cache clearing aborted: {e}"));
                e
            })?;
            summary.backup = Some(backup.root);
            true
        } else {
            false
        };

        let mut ledger = if options.generate_tags && !cleared {
            self.load_ledger(&paths.ledger_file)
        } else {
            Vec::new()
        };

        let mut tagging = if options.generate_tags {
            self.enter(RunStage::LoadingModels);
            let candidates = load_candidate_tags(
                &paths.candidate_tags_file,
                &paths.exclusions_file,
                &reporter.scoped("candidates"),
            );
            let classifier =
                TagClassifier::load(self.classifier_loader.as_ref(), &reporter.scoped("classifier"))
                    .await;
            Some(Tagging {
                candidates,
                classifier,
                known: ledger.iter().map(|r| r.media_id.clone()).collect(),
            })
        } else {
            None
        };

        if options.generate_artifacts && !cleared && scan_trusted {
            self.enter(RunStage::ReconcilingArtifacts);
            summary.pruned_artifacts = prune_artifacts(
                self.artifacts.preview_dir(),
                &ids,
                &reporter.scoped("reconcile"),
            );
        }

        self.enter(RunStage::ProcessingVideos);
        let total = videos.len();
        self.progress.set_length(total as u64);
        for (i, video) in videos.iter_mut().enumerate() {
            self.progress.set_message(video.id.clone());
            reporter.info(format!(
                "Processing video {}/{total}: {}",
                i + 1,
                video.relative_path.display()
            ));
            let outcome = self.process_video(video, options, tagging.as_mut()).await;
            summary.record(&outcome);
            if let VideoOutcome::Recorded(Some(row)) = outcome {
                ledger.push(row);
            }
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        if options.generate_tags {
            if scan_trusted {
                self.enter(RunStage::ReconcilingLedger);
                let (kept, removed) = prune_ledger(ledger, &ids, &reporter.scoped("reconcile"));
                ledger = kept;
                summary.pruned_ledger_rows = removed;
            } else {
                reporter.warn("Skipping orphaned tag cleanup: scan result is not trusted");
            }

            self.enter(RunStage::PersistingLedger);
            summary.ledger_rows_written = self.persist_ledger(&paths.ledger_file, &ledger);
        }

        self.enter(RunStage::Done);
        summary.elapsed_secs = started.elapsed().as_secs_f64();
        summary.warnings = reporter.warnings() - warnings_before;
        summary.errors = reporter.errors() - errors_before;
        reporter.info(format!(
            "Media processing complete: {}/{} videos processed in {:.2} seconds",
            summary.tagged, summary.total, summary.elapsed_secs
        ));
        Ok(summary)
    }

    fn load_ledger(&self, path: &Path) -> Vec<TagRecord> {
        match storage::load(path) {
            Ok(records) => {
                self.reporter
                    .info(format!("Loaded {} existing tag rows from {}", records.len(), path.display()));
                records
            }
            Err(e) => {
                self.reporter.error(format!(
                    "Could not read {}: {e}; continuing with an empty ledger",
                    path.display()
                ));
                Vec::new()
            }
        }
    }

    fn persist_ledger(&self, path: &Path, records: &[TagRecord]) -> usize {
        match storage::save(path, records) {
            Ok(0) => {
                self.reporter
                    .debug(format!("No tags to write; {} left untouched", path.display()));
                0
            }
            Ok(written) => {
                self.reporter
                    .success(format!("Generated {}: {written} videos tagged", path.display()));
                written
            }
            Err(e) => {
                self.reporter
                    .error(format!("Failed to write {}: {e}", path.display()));
                0
            }
        }
    }

    async fn process_video(
        &self,
        video: &mut VideoAsset,
        options: RunOptions,
        tagging: Option<&mut Tagging>,
    ) -> VideoOutcome {
        let reporter = &self.reporter;
        let source = self.config.paths.video_dir.join(&video.relative_path);
        let rel = video.relative_path.display().to_string();

        video.duration = probe_duration(self.probe.as_ref(), &source, &reporter.scoped("probe")).await;
        if video.duration < MIN_DURATION_SECS {
            reporter.warn(format!(
                "Skipping {rel}: Duration {:.2}s < {MIN_DURATION_SECS}s",
                video.duration
            ));
            return VideoOutcome::Skipped(SkipReason::TooShort(video.duration));
        }

        let pair = match self
            .ensure_artifacts(video, &source, options.generate_artifacts)
            .await
        {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };

        let Some(tagging) = tagging else {
            return VideoOutcome::Recorded(None);
        };
        if tagging.known.contains(&video.id) {
            reporter.info(format!("Tags already exist for {}, skipping", video.id));
            return VideoOutcome::Recorded(None);
        }
        if !tagging.classifier.is_available() {
            reporter.warn(format!("Skipping tagging for {rel} due to model failure"));
            return VideoOutcome::Recorded(None);
        }
        let Some(thumbnail) = pair.thumbnail else {
            return VideoOutcome::Skipped(SkipReason::ArtifactsMissing);
        };

        let tags = tagging
            .classifier
            .tag_image(&thumbnail.path, &tagging.candidates, &reporter.scoped("classifier"))
            .await;
        if tags.is_empty() {
            reporter.warn(format!("No tags generated for {rel}, will retry next run"));
            return VideoOutcome::Recorded(None);
        }
        tagging.known.insert(video.id.clone());
        VideoOutcome::Recorded(Some(TagRecord::video(video.id.clone(), tags)))
    }

    /// Existence is checked right before each render; present files are reused.
    async fn ensure_artifacts(
        &self,
        video: &VideoAsset,
        source: &Path,
        generate: bool,
    ) -> Result<ArtifactPair, VideoOutcome> {
        let reporter = self.reporter.scoped("artifacts");
        let rel = video.relative_path.display();
        let existing = self.artifacts.existing(&video.id);

        if !generate {
            if existing.is_complete() {
                return Ok(existing);
            }
            reporter.warn(format!(
                "Thumbnail or GIF missing for {rel}, but generation disabled"
            ));
            return Err(VideoOutcome::Skipped(SkipReason::ArtifactsMissing));
        }

        let thumbnail = match existing.thumbnail {
            Some(found) => {
                reporter.info(format!("JPEG exists: {}", found.path.display()));
                found
            }
            None => self
                .artifacts
                .thumbnail(source, &video.id, video.duration, &reporter)
                .await
                .map_err(|e| {
                    reporter.warn(format!("Failed to generate JPEG for {rel}"));
                    VideoOutcome::Failed(VideoError::Thumbnail(e))
                })?,
        };

        let clip = match existing.clip {
            Some(found) => {
                reporter.info(format!("GIF exists: {}", found.path.display()));
                found
            }
            None => self
                .artifacts
                .clip(source, &video.id, video.duration, &reporter)
                .await
                .map_err(|e| {
                    reporter.warn(format!("Failed to generate GIF for {rel}"));
                    VideoOutcome::Failed(VideoError::Clip(e))
                })?,
        };

        Ok(ArtifactPair {
            thumbnail: Some(thumbnail),
            clip: Some(clip),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(&VideoOutcome::Recorded(None));
        summary.record(&VideoOutcome::Recorded(Some(TagRecord::video("a", vec!["cat".into()]))));
        summary.record(&VideoOutcome::Skipped(SkipReason::TooShort(3.0)));
        summary.record(&VideoOutcome::Failed(VideoError::Clip(GenerationError::MissingOutput(
            PathBuf::from("a.gif"),
        ))));
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.tagged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn stages_render_as_kebab_case() {
        assert_eq!(RunStage::ReconcilingArtifacts.to_string(), "reconciling-artifacts");
        assert_eq!(RunStage::Done.to_string(), "done");
    }
}
