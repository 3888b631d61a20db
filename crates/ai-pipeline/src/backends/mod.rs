/// Image generation backends
///
/// Provides a unified interface over external text-to-image providers:
/// - OpenAI Images API
/// - Scripted mock (tests, offline demos)

pub mod mock;
pub mod openai;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::{MockCall, MockImageGenerator};
pub use openai::OpenAiImageGenerator;

/// Output resolution requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    /// 512x512
    Small,
    /// 1024x1024
    Large,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "512x512",
            Self::Large => "1024x1024",
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation model, trading resolution for cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImageModel {
    /// DALL-E 2 at 512x512
    #[default]
    #[serde(rename = "dall-e-2")]
    Standard,
    /// DALL-E 3 at 1024x1024
    #[serde(rename = "dall-e-3")]
    HighFidelity,
}

impl ImageModel {
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Standard => "dall-e-2",
            Self::HighFidelity => "dall-e-3",
        }
    }

    /// Resolution requested for this model.
    pub fn resolution(&self) -> ImageSize {
        match self {
            Self::Standard => ImageSize::Small,
            Self::HighFidelity => ImageSize::Large,
        }
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

impl std::str::FromStr for ImageModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dall-e-2" | "dalle2" | "standard" => Ok(Self::Standard),
            "dall-e-3" | "dalle3" | "hd" | "high-fidelity" => Ok(Self::HighFidelity),
            other => Err(format!("unknown image model: {other}")),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generator not configured: {0}")]
    Configuration(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// External text-to-image provider
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Generate one image and return its URL
    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        model: ImageModel,
    ) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_resolution() {
        assert_eq!(ImageModel::Standard.resolution(), ImageSize::Small);
        assert_eq!(ImageModel::HighFidelity.resolution(), ImageSize::Large);
        assert_eq!(ImageSize::Large.to_string(), "1024x1024");
    }

    #[test]
    fn model_names_parse_and_serialize() {
        assert_eq!("dall-e-3".parse::<ImageModel>(), Ok(ImageModel::HighFidelity));
        assert_eq!(" DALL-E-2 ".parse::<ImageModel>(), Ok(ImageModel::Standard));
        assert!("midjourney".parse::<ImageModel>().is_err());
        assert_eq!(
            serde_json::to_string(&ImageModel::HighFidelity).unwrap(),
            "\"dall-e-3\""
        );
    }
}
