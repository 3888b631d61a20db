/// OpenAI Images backend
///
/// Calls `POST /images/generations` once per request. Retries are left to
/// the caller; the generation pipeline deliberately never retries.
use super::{GenerationError, ImageGenerator, ImageModel, ImageSize};
use crate::config::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const IMAGES_PATH: &str = "images/generations";

/// OpenAI image generation client
pub struct OpenAiImageGenerator {
    api_key: String,
    api_base: String,
    organization: Option<String>,
    client: reqwest::Client,
}

impl OpenAiImageGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::configuration("OpenAI API key is required."))?
            .to_string();
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(20));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| GenerationError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            organization: config.organization.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{IMAGES_PATH}", self.api_base)
    }
}

/// Build the request body for one image.
fn request_body(prompt: &str, size: ImageSize, model: ImageModel) -> ImagesRequest<'_> {
    let hd = model == ImageModel::HighFidelity;
    ImagesRequest {
        model: model.api_name(),
        prompt,
        size: size.as_str(),
        n: 1,
        quality: hd.then_some("standard"),
        style: hd.then_some("vivid"),
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn classify_status(status: u16, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("OpenAI returned HTTP {status}"));
    match status {
        401 | 403 => GenerationError::Authentication(message),
        429 => GenerationError::RateLimited(message),
        _ => GenerationError::Transport(message),
    }
}

#[async_trait::async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        model: ImageModel,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();
        tracing::info!(
            target: "generation",
            "OpenAI image request start: model={}, size={}",
            model,
            size
        );
        let mut request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body(prompt, size, model));
        if let Some(org) = self.organization.as_deref().map(str::trim) {
            if !org.is_empty() {
                request = request.header("OpenAI-Organization", org);
            }
        }
        let response = request
            .send()
            .await
            .map_err(|err| GenerationError::transport(format!("OpenAI request failed: {err}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GenerationError::transport(format!("Read OpenAI response failed: {err}")))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }
        let parsed: ImagesResponse = serde_json::from_str(&body).map_err(|err| {
            GenerationError::invalid_response(format!("Invalid OpenAI response JSON: {err}"))
        })?;
        let url = parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| GenerationError::invalid_response("No image URL returned from OpenAI"))?;
        tracing::info!(
            target: "generation",
            "OpenAI image request completed in {:.2?}",
            start.elapsed()
        );
        Ok(url)
    }
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        let config = GeneratorConfig::default();
        assert!(matches!(
            OpenAiImageGenerator::new(&config),
            Err(GenerationError::Configuration(_))
        ));
        let config = GeneratorConfig {
            api_key: Some("  ".into()),
            ..GeneratorConfig::default()
        };
        assert!(OpenAiImageGenerator::new(&config).is_err());
    }

    #[test]
    fn endpoint_joins_base() {
        let config = GeneratorConfig {
            api_key: Some("sk-test".into()),
            api_base: "http://localhost:9999/v1/".into(),
            ..GeneratorConfig::default()
        };
        let generator = OpenAiImageGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:9999/v1/images/generations");
        assert_eq!(generator.name(), "openai");
    }

    #[test]
    fn dalle2_body_has_no_hd_options() {
        let json = serde_json::to_value(request_body("p", ImageSize::Small, ImageModel::Standard)).unwrap();
        assert_eq!(json["model"], "dall-e-2");
        assert_eq!(json["size"], "512x512");
        assert_eq!(json["n"], 1);
        assert!(json.get("quality").is_none());
        assert!(json.get("style").is_none());
    }

    #[test]
    fn dalle3_body_carries_quality_and_style() {
        let json =
            serde_json::to_value(request_body("p", ImageSize::Large, ImageModel::HighFidelity)).unwrap();
        assert_eq!(json["model"], "dall-e-3");
        assert_eq!(json["size"], "1024x1024");
        assert_eq!(json["quality"], "standard");
        assert_eq!(json["style"], "vivid");
    }

    #[test]
    fn status_classification_uses_provider_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            classify_status(401, body),
            GenerationError::Authentication("Incorrect API key provided".into())
        );
        assert!(matches!(classify_status(429, "{}"), GenerationError::RateLimited(_)));
        assert_eq!(
            classify_status(500, "<html>"),
            GenerationError::Transport("OpenAI returned HTTP 500".into())
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let config = GeneratorConfig {
            api_key: Some("sk-test".into()),
            api_base: "http://127.0.0.1:9/v1".into(),
            timeout_secs: Some(2),
            ..GeneratorConfig::default()
        };
        let generator = OpenAiImageGenerator::new(&config).unwrap();
        let err = generator
            .generate("a ninja", ImageSize::Small, ImageModel::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }
}
