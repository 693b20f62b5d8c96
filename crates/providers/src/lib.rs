//! Provider abstractions for zero-shot image classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod http;
pub mod noop;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// One candidate label and the score the classifier gave it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Scores an image against an open label vocabulary.
///
/// `image_png` is a PNG-encoded RGB image. Implementations return one score per
/// candidate label; ordering of the returned entries is not significant.
#[async_trait::async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        image_png: &[u8],
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    classifiers: HashMap<String, Arc<dyn ZeroShotClassifier>>,
    pub preferred_classifier: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, name: &str, provider: Arc<dyn ZeroShotClassifier>) -> Self {
        self.classifiers.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_classifier(mut self, name: &str) -> Self {
        self.preferred_classifier = Some(name.to_string());
        self
    }

    pub fn classifier(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn ZeroShotClassifier>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_classifier.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no classifier provider configured".into())
            })?;
        self.classifiers
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classifiers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
