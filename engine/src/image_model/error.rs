use reqwest::StatusCode;
use thiserror::Error;

/// Errors from talking to the image generation service
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request to {url} failed ({status}): {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response ({reason}): {body}")]
    Malformed { reason: String, body: String },

    /// The service reports the prediction as `failed` or `canceled`
    #[error("Prediction {id} {status}: {detail}")]
    PredictionFailed {
        id: String,
        status: String,
        detail: String,
    },

    #[error("Generation was cancelled")]
    Cancelled,
}
