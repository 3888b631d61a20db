/// AI generation pipeline for manga strips
///
/// Style template derivation, prompt composition, external image generation
/// and the placeholder fallback policy.

pub mod backends;
pub mod config;
pub mod fallback;
pub mod pipeline;
pub mod reference;
pub mod style;

pub use backends::{
    GenerationError, ImageGenerator, ImageModel, ImageSize, MockImageGenerator,
    OpenAiImageGenerator,
};
pub use config::GeneratorConfig;
pub use fallback::{FallbackBucket, FallbackChoice, FallbackSelector};
pub use pipeline::{
    GenerationOutcome, GenerationPipeline, GenerationRequest, ImageSource, SCENE_DELIMITER,
    STYLE_DIRECTION,
};
pub use reference::{ReferenceError, ReferenceImage};
pub use style::{StyleError, StyleTemplate, StyleTemplateEngine, TemplateSource};
