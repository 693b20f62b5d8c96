use providers::http::{HttpClassifier, HttpClassifierConfig};
use providers::noop::NoopClassifier;
use providers::{LabelScore, ProviderError, ProviderRegistry, ZeroShotClassifier};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::candidates::CandidateTagSet;
use crate::config::ClassifierConfig;
use crate::report::Reporter;

/// Labels kept per image.
pub const TOP_TAGS: usize = storage::MAX_TAGS;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to open {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to re-encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("image decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Produces the classifier backend for a run. Called at most once per run.
#[async_trait::async_trait]
pub trait ClassifierLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ZeroShotClassifier>, ProviderError>;
}

/// Loads whatever `classifier.provider` names.
pub struct ConfiguredClassifier {
    cfg: ClassifierConfig,
}

impl ConfiguredClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait::async_trait]
impl ClassifierLoader for ConfiguredClassifier {
    async fn load(&self) -> Result<Arc<dyn ZeroShotClassifier>, ProviderError> {
        build_registry(&self.cfg).await?.classifier(None)
    }
}

pub async fn build_registry(cfg: &ClassifierConfig) -> Result<ProviderRegistry, ProviderError> {
    let mut reg = ProviderRegistry::new().with_classifier("noop", Arc::new(NoopClassifier));

    match (&cfg.url, cfg.provider.as_str()) {
        (Some(url), _) => {
            let connected = HttpClassifier::connect(HttpClassifierConfig {
                base_url: url.clone(),
                model: cfg.model.clone(),
                timeout_secs: cfg.timeout_secs,
            })
            .await;
            match connected {
                Ok(provider) => reg = reg.with_classifier("http", Arc::new(provider)),
                Err(e) if cfg.provider == "http" => return Err(e),
                Err(e) => tracing::warn!(error = %e, "http classifier not registered"),
            }
        }
        (None, "http") => {
            return Err(ProviderError::Unavailable(
                "classifier.url is not configured".to_string(),
            ))
        }
        (None, _) => {}
    }

    Ok(reg.set_preferred_classifier(&cfg.provider))
}

/// Sorts by descending score, keeping vocabulary order for ties, and keeps `limit`.
///
/// Labels outside the vocabulary, repeated labels and non-finite scores are dropped.
pub fn rank_labels(scores: Vec<LabelScore>, vocabulary: &[String], limit: usize) -> Vec<LabelScore> {
    let position = |label: &str| vocabulary.iter().position(|v| v == label);
    let mut seen = HashSet::new();
    let mut ranked: Vec<(usize, LabelScore)> = scores
        .into_iter()
        .filter(|s| s.score.is_finite())
        .filter_map(|s| position(&s.label).map(|p| (p, s)))
        .filter(|(p, _)| seen.insert(*p))
        .collect();
    ranked.sort_by_key(|(p, _)| *p);
    ranked.sort_by(|(_, a), (_, b)| b.score.total_cmp(&a.score));
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, s)| s).collect()
}

pub struct TagClassifier {
    backend: Option<Arc<dyn ZeroShotClassifier>>,
}

impl TagClassifier {
    pub fn new(backend: Arc<dyn ZeroShotClassifier>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Initializes the backend once; failure leaves tagging disabled for the run.
    pub async fn load(loader: &dyn ClassifierLoader, reporter: &Reporter) -> Self {
        reporter.debug("Loading zero-shot classifier...");
        match loader.load().await {
            Ok(backend) => {
                reporter.success("Classifier loaded successfully");
                Self::new(backend)
            }
            Err(e) => {
                reporter.error(format!("Failed to load classifier: {e}"));
                reporter.warn("Continuing with empty tags due to model failure");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Top labels for the image at `path`, best first. Empty on any failure.
    pub async fn tag_image(
        &self,
        path: &Path,
        candidates: &CandidateTagSet,
        reporter: &Reporter,
    ) -> Vec<String> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        if candidates.is_empty() {
            return Vec::new();
        }
        reporter.debug(format!("Tagging image: {}", path.display()));

        match Self::score(backend.as_ref(), path, candidates).await {
            Ok(ranked) => {
                let summary: Vec<String> = ranked
                    .iter()
                    .map(|s| format!("{} ({:.2})", s.label, s.score))
                    .collect();
                reporter.success(format!("Tags for {}: {}", path.display(), summary.join(", ")));
                ranked.into_iter().map(|s| s.label).collect()
            }
            Err(e) => {
                reporter.error(format!("Error tagging {}: {e}", path.display()));
                Vec::new()
            }
        }
    }

    async fn score(
        backend: &dyn ZeroShotClassifier,
        path: &Path,
        candidates: &CandidateTagSet,
    ) -> Result<Vec<LabelScore>, TagError> {
        let owned = path.to_path_buf();
        let png = tokio::task::spawn_blocking(move || encode_rgb_png(&owned)).await??;
        let scores = backend.classify(&png, candidates.as_slice()).await?;
        Ok(rank_labels(scores, candidates.as_slice(), TOP_TAGS))
    }
}

/// Decodes any supported image and re-encodes it as an RGB PNG.
fn encode_rgb_png(path: &Path) -> Result<Vec<u8>, TagError> {
    let img = image::open(path).map_err(|source| TagError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, image::ImageOutputFormat::Png)
        .map_err(TagError::Encode)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(label: &str, score: f32) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    fn vocab(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ranking_is_descending_with_vocabulary_tie_break() {
        let vocabulary = vocab(&["cat", "dog", "sky", "car"]);
        let ranked = rank_labels(
            vec![
                score("sky", 0.2),
                score("car", 0.5),
                score("dog", 0.2),
                score("cat", 0.1),
            ],
            &vocabulary,
            TOP_TAGS,
        );
        let labels: Vec<_> = ranked.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["car", "dog", "sky", "cat"]);
    }

    #[test]
    fn non_finite_scores_never_outrank_real_ones() {
        let vocabulary = vocab(&["cat", "dog", "sky"]);
        let ranked = rank_labels(
            vec![
                score("cat", f32::NAN),
                score("dog", 0.3),
                score("sky", f32::INFINITY),
                score("cat", 0.1),
            ],
            &vocabulary,
            TOP_TAGS,
        );
        let labels: Vec<_> = ranked.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["dog", "cat"]);
    }

    #[test]
    fn ranking_truncates_and_drops_unknown_labels() {
        let vocabulary: Vec<String> = (0..30).map(|i| format!("t{i}")).collect();
        let mut scores: Vec<LabelScore> =
            (0..30).map(|i| score(&format!("t{i}"), i as f32)).collect();
        scores.push(score("intruder", 100.0));
        scores.push(score("t29", 50.0));

        let ranked = rank_labels(scores, &vocabulary, TOP_TAGS);
        assert_eq!(ranked.len(), TOP_TAGS);
        assert_eq!(ranked[0].label, "t29");
        assert_eq!(ranked[0].score, 29.0);
        assert!(ranked.iter().all(|s| s.label != "intruder"));
    }

    #[tokio::test]
    async fn unavailable_classifier_yields_no_tags() {
        let temp = tempfile::tempdir().unwrap();
        let tags = TagClassifier::unavailable()
            .tag_image(
                &temp.path().join("a_thumb.jpg"),
                &CandidateTagSet::defaults(),
                &Reporter::default(),
            )
            .await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn undecodable_image_yields_no_tags() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a_thumb.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let reporter = Reporter::default();
        let tags = TagClassifier::new(Arc::new(NoopClassifier))
            .tag_image(&path, &CandidateTagSet::defaults(), &reporter)
            .await;
        assert!(tags.is_empty());
        assert_eq!(reporter.errors(), 1);
    }

    #[tokio::test]
    async fn http_provider_without_url_is_unavailable() {
        let cfg = ClassifierConfig {
            provider: "http".to_string(),
            url: None,
            model: "clip".to_string(),
            timeout_secs: 1,
        };
        let res = ConfiguredClassifier::new(cfg).load().await;
        assert!(matches!(res, Err(ProviderError::Unavailable(_))));

        let noop = ClassifierConfig {
            provider: "noop".to_string(),
            url: None,
            model: "clip".to_string(),
            timeout_secs: 1,
        };
        assert!(ConfiguredClassifier::new(noop).load().await.is_ok());
    }
}
