use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;

use super::{
    GenerationFuture, GenerationRequest, GenerationResult, ImageGenerator, RemoteError,
    request::ModelInput,
};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(api_token: String) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url: DEFAULT_BASE_URL.into(),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn create_prediction(
        &self,
        request: &GenerationRequest,
    ) -> Result<Prediction, RemoteError> {
        let url = format!(
            "{}/v1/models/{}/predictions",
            self.base_url,
            request.model().id()
        );
        let body = PredictionRequest {
            input: request.input(),
        };
        debug!(
            "Creating prediction at {url}: {}",
            serde_json::to_string(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        read_prediction(resp).await
    }

    async fn get_prediction(&self, url: &str) -> Result<Prediction, RemoteError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        read_prediction(resp).await
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: ModelInput<'a>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

async fn read_prediction(resp: reqwest::Response) -> Result<Prediction, RemoteError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(RemoteError::Status { url, status, body });
    }

    serde_json::from_str(&body).map_err(|e| RemoteError::Malformed {
        reason: e.to_string(),
        body,
    })
}

impl ImageGenerator for ReplicateClient {
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move {
            let request = request.clone().clamped();

            // 1. Create prediction
            let mut prediction = self.create_prediction(&request).await?;
            info!("Prediction {} created for {}", prediction.id, request.model());

            let poll_url = prediction
                .urls
                .as_ref()
                .map(|urls| urls.get.clone())
                .ok_or_else(|| RemoteError::Malformed {
                    reason: "missing urls.get".into(),
                    body: format!("{prediction:?}"),
                })?;

            // 2. Poll until finished
            loop {
                match prediction.status.as_str() {
                    "succeeded" => {
                        debug!("Prediction {} output: {}", prediction.id, prediction.output);
                        return Ok(GenerationResult::from_output(prediction.output));
                    }
                    "failed" | "canceled" => {
                        return Err(RemoteError::PredictionFailed {
                            id: prediction.id,
                            status: prediction.status.clone(),
                            detail: prediction.error.to_string(),
                        });
                    }
                    _ => {
                        sleep(self.poll_interval).await;
                        prediction = self.get_prediction(&poll_url).await?;
                    }
                }
            }
        })
    }
}
