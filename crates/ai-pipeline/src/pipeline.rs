/// Style-consistent generation pipeline
///
/// Composes the final prompt, calls the external generator at most once and
/// falls back to a placeholder on any absence or failure. `generate` never
/// returns an error; failures travel as a notice on the outcome.
use crate::backends::{GenerationError, ImageGenerator, ImageModel};
use crate::fallback::{FallbackBucket, FallbackSelector};
use crate::style::StyleTemplate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Separates the template from the new scene description.
pub const SCENE_DELIMITER: &str = " NEW SCENE: ";

/// Appended to untemplated prompts to steer toward flat illustration.
pub const STYLE_DIRECTION: &str = "Anime manga style digital artwork, clean vector line art with bold black outlines, flat cel-shaded colors with solid fills and no gradients, crisp digital illustration, manga panel composition, bright saturated colors, not realistic and not photographic.";

/// Everything needed to produce one frame image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub description: String,
    pub template: Option<StyleTemplate>,
    pub model: ImageModel,
    pub has_committed_frames: bool,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            template: None,
            model: ImageModel::default(),
            has_committed_frames: false,
        }
    }

    pub fn with_template(mut self, template: Option<StyleTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn with_model(mut self, model: ImageModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_committed_frames(mut self, has_committed_frames: bool) -> Self {
        self.has_committed_frames = has_committed_frames;
        self
    }

    /// Final prompt sent to the generator.
    ///
    /// Template text always comes first, followed by the new scene.
    pub fn compose_prompt(&self) -> String {
        let description = self.description.trim();
        match &self.template {
            Some(template) if template.applies(self.has_committed_frames) => {
                format!("{}{SCENE_DELIMITER}{description}", template.text)
            }
            _ => {
                let description = description.trim_end_matches(['.', '!', '?']);
                format!("{description}. {STYLE_DIRECTION}")
            }
        }
    }
}

/// Where the returned image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Generated,
    Fallback {
        /// `None` when the default pool was used
        bucket: Option<FallbackBucket>,
    },
}

/// Result of one pipeline run; always carries a usable URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub image_url: String,
    pub source: ImageSource,
    pub prompt: String,
    /// User-visible message when the generator failed
    pub notice: Option<String>,
}

impl GenerationOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ImageSource::Fallback { .. })
    }
}

#[derive(Clone)]
pub struct GenerationPipeline {
    generator: Option<Arc<dyn ImageGenerator>>,
    fallback: FallbackSelector,
    demo_delay: Duration,
}

impl GenerationPipeline {
    pub fn new(generator: Option<Arc<dyn ImageGenerator>>) -> Self {
        Self {
            generator,
            fallback: FallbackSelector::new(),
            demo_delay: Duration::from_millis(crate::config::DEFAULT_DEMO_DELAY_MS),
        }
    }

    /// Pipeline without a generator; every request takes the fallback path.
    pub fn demo() -> Self {
        Self::new(None)
    }

    pub fn with_generator(generator: Arc<dyn ImageGenerator>) -> Self {
        Self::new(Some(generator))
    }

    pub fn with_demo_delay(mut self, delay: Duration) -> Self {
        self.demo_delay = delay;
        self
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub fn generator_name(&self) -> Option<&str> {
        self.generator.as_deref().map(|g| g.name())
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let prompt = request.compose_prompt();
        let Some(generator) = self.generator.as_ref() else {
            tracing::debug!(
                target: "generation",
                "No generator configured; demo fallback after {:?}",
                self.demo_delay
            );
            if !self.demo_delay.is_zero() {
                tokio::time::sleep(self.demo_delay).await;
            }
            return self.fallback(request, prompt, None);
        };

        let start = Instant::now();
        let size = request.model.resolution();
        match generator.generate(&prompt, size, request.model).await {
            Ok(image_url) => {
                tracing::info!(
                    target: "generation",
                    "{} generated image in {:.2?}",
                    generator.name(),
                    start.elapsed()
                );
                GenerationOutcome {
                    image_url,
                    source: ImageSource::Generated,
                    prompt,
                    notice: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "generation",
                    "{} generation failed after {:.2?}: {}",
                    generator.name(),
                    start.elapsed(),
                    err
                );
                self.fallback(request, prompt, Some(err))
            }
        }
    }

    /// Placeholder chosen from the raw description, never the composed prompt.
    fn fallback(
        &self,
        request: &GenerationRequest,
        prompt: String,
        error: Option<GenerationError>,
    ) -> GenerationOutcome {
        let choice = self.fallback.select(&request.description);
        match choice.bucket {
            Some(bucket) => tracing::debug!(target: "generation", "Fallback bucket: {}", bucket),
            None => tracing::debug!(target: "generation", "Fallback from default pool"),
        }
        GenerationOutcome {
            image_url: choice.url,
            source: ImageSource::Fallback {
                bucket: choice.bucket,
            },
            prompt,
            // A generator that is not configured is the demo path, not a failure.
            notice: error
                .filter(|err| !matches!(err, GenerationError::Configuration(_)))
                .map(|err| err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ImageSize, MockImageGenerator};
    use crate::style::{StyleTemplateEngine, TemplateSource};

    fn first_frame_template() -> StyleTemplate {
        let mut engine = StyleTemplateEngine::new();
        engine
            .derive_from_first_frame("a ninja in the moonlight")
            .unwrap()
            .clone()
    }

    #[test]
    fn untemplated_prompt_gets_style_direction() {
        let prompt = GenerationRequest::new("a ninja in the moonlight.").compose_prompt();
        assert_eq!(prompt, format!("a ninja in the moonlight. {STYLE_DIRECTION}"));
    }

    #[test]
    fn template_precedes_description() {
        let template = first_frame_template();
        let prompt = GenerationRequest::new("the ninja walks into the city")
            .with_template(Some(template.clone()))
            .with_committed_frames(true)
            .compose_prompt();
        assert!(prompt.starts_with(&template.text));
        assert!(prompt.ends_with(" NEW SCENE: the ninja walks into the city"));
        assert!(!prompt.contains(STYLE_DIRECTION));
    }

    #[test]
    fn first_frame_template_ignored_without_committed_frames() {
        let prompt = GenerationRequest::new("a cat")
            .with_template(Some(first_frame_template()))
            .compose_prompt();
        assert!(prompt.starts_with("a cat. "));
    }

    #[test]
    fn manual_template_applies_to_first_frame() {
        let template = StyleTemplate {
            source: TemplateSource::Manual,
            text: "ink wash".into(),
            character_hint: None,
        };
        let prompt = GenerationRequest::new("a cat")
            .with_template(Some(template))
            .compose_prompt();
        assert_eq!(prompt, "ink wash NEW SCENE: a cat");
    }

    #[tokio::test]
    async fn generator_success_is_returned() {
        let mock = MockImageGenerator::succeeding("https://cdn/generated.png");
        let pipeline = GenerationPipeline::with_generator(Arc::new(mock.clone()));
        let request = GenerationRequest::new("a forest").with_model(ImageModel::HighFidelity);
        let outcome = pipeline.generate(&request).await;
        assert_eq!(outcome.image_url, "https://cdn/generated.png");
        assert_eq!(outcome.source, ImageSource::Generated);
        assert!(outcome.notice.is_none());

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].size, ImageSize::Large);
        assert_eq!(calls[0].model, ImageModel::HighFidelity);
        assert_eq!(calls[0].prompt, outcome.prompt);
    }

    #[tokio::test]
    async fn failure_falls_back_once_with_notice() {
        let mock = MockImageGenerator::failing(GenerationError::RateLimited("slow down".into()));
        let pipeline = GenerationPipeline::with_generator(Arc::new(mock.clone()));
        let request = GenerationRequest::new("a walk through the forest")
            .with_template(Some(first_frame_template()))
            .with_committed_frames(true);
        let outcome = pipeline.generate(&request).await;
        assert_eq!(outcome.image_url, FallbackBucket::Forest.url());
        assert_eq!(
            outcome.source,
            ImageSource::Fallback {
                bucket: Some(FallbackBucket::Forest)
            }
        );
        assert_eq!(outcome.notice.as_deref(), Some("rate limited: slow down"));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn configuration_error_falls_back_silently() {
        let mock = MockImageGenerator::failing(GenerationError::configuration("no key"));
        let pipeline = GenerationPipeline::with_generator(Arc::new(mock.clone()));
        let outcome = pipeline.generate(&GenerationRequest::new("waves on the ocean")).await;
        assert_eq!(outcome.image_url, FallbackBucket::Ocean.url());
        assert!(outcome.is_fallback());
        assert!(outcome.notice.is_none());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn demo_mode_uses_raw_description() {
        let pipeline = GenerationPipeline::demo().with_demo_delay(Duration::ZERO);
        let outcome = pipeline
            .generate(&GenerationRequest::new("a ninja in the moonlight"))
            .await;
        assert_eq!(outcome.image_url, FallbackBucket::NightScene.url());
        assert!(outcome.is_fallback());
        assert!(outcome.notice.is_none());
        assert!(outcome.prompt.contains(STYLE_DIRECTION));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_mode_waits_for_configured_delay() {
        let pipeline = GenerationPipeline::demo().with_demo_delay(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        pipeline.generate(&GenerationRequest::new("an ocean")).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
