use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter};

mod error;
pub use error::RemoteError;

pub mod replicate;
pub use replicate::ReplicateClient;

pub mod request;
pub use request::{
    AspectRatio, GenerationRequest, ModelParams, NumericField, OutputFormat, ProParams,
    SchnellParams,
};

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
)]
pub enum Model {
    #[strum(to_string = "Flux Pro")]
    FluxPro,
    #[strum(to_string = "Flux Schnell")]
    FluxSchnell,
}

impl Model {
    /// `owner/name` on Replicate
    pub fn id(&self) -> &'static str {
        match self {
            Model::FluxPro => "black-forest-labs/flux-pro",
            Model::FluxSchnell => "black-forest-labs/flux-schnell",
        }
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            Model::FluxPro => "fp",
            Model::FluxSchnell => "fs",
        }
    }
}

/// What a finished prediction produced, classified once when the response
/// arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    SingleImage(String),
    MultiImage(Vec<String>),
    Unrecognized(Value),
}

impl GenerationResult {
    pub fn from_output(output: Value) -> Self {
        match output {
            Value::String(url) if is_url(&url) => Self::SingleImage(url),
            Value::Array(items) => {
                let urls: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| is_url(s))
                    .map(String::from)
                    .collect();
                if urls.is_empty() {
                    Self::Unrecognized(Value::Array(items))
                } else {
                    Self::MultiImage(urls)
                }
            }
            other => Self::Unrecognized(other),
        }
    }

    pub fn urls(&self) -> &[String] {
        match self {
            Self::SingleImage(url) => std::slice::from_ref(url),
            Self::MultiImage(urls) => urls,
            Self::Unrecognized(_) => &[],
        }
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http")
}

pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GenerationResult, RemoteError>> + Send + 'a>>;

pub trait ImageGenerator {
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> GenerationFuture<'a>;
}
