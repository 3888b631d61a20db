use crate::backends::{ImageGenerator, ImageModel, OpenAiImageGenerator};
use crate::pipeline::GenerationPipeline;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Simulated latency of demo-mode generation.
pub const DEFAULT_DEMO_DELAY_MS: u64 = 2000;

/// Generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// API key; absent or blank means demo mode
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: String,

    /// Optional organization header
    pub organization: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Default model for new sessions
    pub model: ImageModel,

    /// Delay applied on the demo-mode path
    pub demo_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            organization: None,
            timeout_secs: Some(120),
            model: ImageModel::default(),
            demo_delay_ms: DEFAULT_DEMO_DELAY_MS,
        }
    }
}

impl GeneratorConfig {
    /// Resolve from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        config.api_key = non_blank("OPENAI_API_KEY");
        if let Some(base) = non_blank("OPENAI_API_BASE") {
            config.api_base = base;
        }
        config.organization = non_blank("OPENAI_ORGANIZATION");
        if let Some(model) = non_blank("MANGASTRIP_MODEL") {
            config.model = model
                .parse()
                .map_err(anyhow::Error::msg)
                .context("MANGASTRIP_MODEL")?;
        }
        if let Some(delay) = non_blank("MANGASTRIP_DEMO_DELAY_MS") {
            config.demo_delay_ms = delay
                .trim()
                .parse()
                .with_context(|| format!("MANGASTRIP_DEMO_DELAY_MS is not a number: {delay}"))?;
        }
        Ok(config)
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo_delay_ms)
    }

    /// Build the configured generator, or `None` in demo mode.
    pub fn build_generator(&self) -> Result<Option<Arc<dyn ImageGenerator>>> {
        if !self.is_ai_enabled() {
            return Ok(None);
        }
        let generator = OpenAiImageGenerator::new(self)?;
        Ok(Some(Arc::new(generator)))
    }

    pub fn build_pipeline(&self) -> Result<GenerationPipeline> {
        Ok(GenerationPipeline::new(self.build_generator()?).with_demo_delay(self.demo_delay()))
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading generator config {}", path.display()))?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api_key = copy.api_key.map(|key| {
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{tail}")
        });
        copy
    }
}
