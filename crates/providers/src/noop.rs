use crate::{LabelScore, ProviderError, ZeroShotClassifier};

/// Placeholder classifier used when no inference backend is wired up.
#[derive(Debug, Default)]
pub struct NoopClassifier;

#[async_trait::async_trait]
impl ZeroShotClassifier for NoopClassifier {
    async fn classify(
        &self,
        _image_png: &[u8],
        _candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
