use crate::{LabelScore, ProviderError, ZeroShotClassifier};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpClassifierConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Zero-shot classifier served by an inference endpoint.
///
/// Wire format: `POST {base_url}/classify` with
/// `{"model", "image", "candidate_labels"}` where `image` is base64 PNG; the
/// response is a JSON array of `{"label", "score"}` objects.
#[derive(Clone)]
pub struct HttpClassifier {
    client: Client,
    cfg: Arc<HttpClassifierConfig>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    image: String,
    candidate_labels: &'a [String],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyApiResponse {
    Bare(Vec<LabelScore>),
    Wrapped { results: Vec<LabelScore> },
}

impl HttpClassifier {
    pub fn new(cfg: HttpClassifierConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            cfg: Arc::new(cfg),
        })
    }

    /// Builds the client and checks that the endpoint answers its health probe.
    pub async fn connect(cfg: HttpClassifierConfig) -> Result<Self, ProviderError> {
        let provider = Self::new(cfg)?;
        provider.health().await?;
        Ok(provider)
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    async fn health(&self) -> Result<(), ProviderError> {
        let url = format!("{}/health", self.base_url());
        debug!(%url, "checking classifier endpoint");
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::Unavailable(format!("{url}: {e}")))?;
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.cfg.base_url.trim_end_matches('/')
    }
}

#[async_trait::async_trait]
impl ZeroShotClassifier for HttpClassifier {
    async fn classify(
        &self,
        image_png: &[u8],
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ProviderError> {
        let body = ClassifyRequest {
            model: &self.cfg.model,
            image: base64::engine::general_purpose::STANDARD.encode(image_png),
            candidate_labels,
        };

        let resp = self
            .client
            .post(format!("{}/classify", self.base_url()))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let parsed: ClassifyApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(match parsed {
            ClassifyApiResponse::Bare(scores) => scores,
            ClassifyApiResponse::Wrapped { results } => results,
        })
    }
}
