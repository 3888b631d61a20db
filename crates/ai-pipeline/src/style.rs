/// Style template engine
///
/// Holds the single style/character descriptor that is injected ahead of
/// every later scene description so a strip keeps one look.
use crate::reference::ReferenceImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instruction used once a reference image has been supplied.
pub const REFERENCE_TEMPLATE_TEXT: &str = "Match the uploaded reference image exactly: keep the same art style, the same character design and costume, the same color palette and the same line work and shading.";

/// Wrapper placed around the first committed frame's description.
const MASTER_TEMPLATE_PREFIX: &str = "Keep the art style and the main character exactly as established in the first scene:";
const MASTER_TEMPLATE_SUFFIX: &str = "Same character design, same proportions, same outfit, same color palette and same line work in every frame.";

/// Character hints are cut to this many words.
const CHARACTER_HINT_WORDS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("style template is locked ({0}); reset it first")]
    Locked(TemplateSource),
    #[error("a style template already exists ({0})")]
    AlreadySet(TemplateSource),
    #[error("style text is empty")]
    Empty,
}

/// Where the current template came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    #[default]
    None,
    FirstFrame,
    ReferenceImage,
    Manual,
}

impl TemplateSource {
    /// Locked templates change only through `reset` or a manual override.
    pub fn is_locking(&self) -> bool {
        matches!(self, Self::FirstFrame | Self::ReferenceImage)
    }
}

impl std::fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::FirstFrame => write!(f, "first frame"),
            Self::ReferenceImage => write!(f, "reference image"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleTemplate {
    pub source: TemplateSource,
    pub text: String,
    /// Display aid only.
    pub character_hint: Option<String>,
}

impl StyleTemplate {
    pub fn is_locked(&self) -> bool {
        self.source.is_locking()
    }

    /// Whether this template is injected for a project in the given state.
    ///
    /// A first-frame template only exists alongside committed frames; a
    /// reference or manual template also shapes the very first frame.
    pub fn applies(&self, has_committed_frames: bool) -> bool {
        match self.source {
            TemplateSource::None => false,
            TemplateSource::FirstFrame => has_committed_frames,
            TemplateSource::ReferenceImage | TemplateSource::Manual => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleTemplateEngine {
    template: Option<StyleTemplate>,
    reference: Option<ReferenceImage>,
}

impl StyleTemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_template(&self) -> Option<&StyleTemplate> {
        self.template.as_ref()
    }

    pub fn source(&self) -> TemplateSource {
        self.template
            .as_ref()
            .map(|t| t.source)
            .unwrap_or(TemplateSource::None)
    }

    pub fn is_locked(&self) -> bool {
        self.source().is_locking()
    }

    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        self.reference.as_ref()
    }

    /// Lock the template to a reference image.
    pub fn set_from_reference_image(&mut self, image: ReferenceImage) -> Result<&StyleTemplate, StyleError> {
        self.ensure_unlocked()?;
        tracing::info!(
            target: "generation",
            "Style template locked to reference image ({}, {} bytes)",
            image.mime(),
            image.byte_len()
        );
        self.reference = Some(image);
        Ok(self.template.insert(StyleTemplate {
            source: TemplateSource::ReferenceImage,
            text: REFERENCE_TEMPLATE_TEXT.to_string(),
            character_hint: None,
        }))
    }

    /// Derive the master template from the first committed frame.
    pub fn derive_from_first_frame(&mut self, description: &str) -> Result<&StyleTemplate, StyleError> {
        if let Some(existing) = &self.template {
            return Err(StyleError::AlreadySet(existing.source));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(StyleError::Empty);
        }
        let description = description.trim_end_matches(['.', '!', '?']);
        let text = format!("{MASTER_TEMPLATE_PREFIX} {description}. {MASTER_TEMPLATE_SUFFIX}");
        tracing::info!(target: "generation", "Style template derived from first frame");
        Ok(self.template.insert(StyleTemplate {
            source: TemplateSource::FirstFrame,
            text,
            character_hint: character_hint(description),
        }))
    }

    /// User-entered override. Replaces any template, locked or not.
    pub fn set_manual(&mut self, style_text: &str, character_text: Option<&str>) -> Result<&StyleTemplate, StyleError> {
        let style_text = style_text.trim();
        let character_text = character_text.map(str::trim).filter(|c| !c.is_empty());
        if style_text.is_empty() && character_text.is_none() {
            return Err(StyleError::Empty);
        }
        let text = match (style_text.is_empty(), character_text) {
            (false, Some(character)) => format!("{style_text}. Main character: {character}."),
            (true, Some(character)) => format!("Main character: {character}."),
            (_, None) => style_text.to_string(),
        };
        if self.is_locked() {
            tracing::info!(target: "generation", "Manual style overrides locked {} template", self.source());
        }
        Ok(self.template.insert(StyleTemplate {
            source: TemplateSource::Manual,
            text,
            character_hint: character_text.map(str::to_string),
        }))
    }

    /// Clear the template and any held reference image.
    pub fn reset(&mut self) {
        if self.template.is_some() || self.reference.is_some() {
            tracing::info!(target: "generation", "Style template reset");
        }
        self.template = None;
        self.reference = None;
    }

    fn ensure_unlocked(&self) -> Result<(), StyleError> {
        match &self.template {
            Some(t) if t.is_locked() => Err(StyleError::Locked(t.source)),
            _ => Ok(()),
        }
    }
}

/// First clause of a description, capped to a few words.
fn character_hint(description: &str) -> Option<String> {
    let clause = description
        .split([',', '.', ';', ':'])
        .next()
        .unwrap_or_default();
    let words: Vec<&str> = clause.split_whitespace().take(CHARACTER_HINT_WORDS).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::PNG_HEADER;

    fn reference() -> ReferenceImage {
        ReferenceImage::from_bytes(&PNG_HEADER).unwrap()
    }

    #[test]
    fn starts_empty() {
        let engine = StyleTemplateEngine::new();
        assert!(engine.current_template().is_none());
        assert_eq!(engine.source(), TemplateSource::None);
        assert!(!engine.is_locked());
    }

    #[test]
    fn first_frame_template_embeds_description() {
        let mut engine = StyleTemplateEngine::new();
        let template = engine
            .derive_from_first_frame("A ninja with cat ears, standing in a moonlit meadow.")
            .unwrap()
            .clone();
        assert_eq!(template.source, TemplateSource::FirstFrame);
        assert!(template
            .text
            .contains("A ninja with cat ears, standing in a moonlit meadow"));
        assert_eq!(template.character_hint.as_deref(), Some("A ninja with cat ears"));
        assert!(engine.is_locked());
    }

    #[test]
    fn derive_refuses_when_template_exists() {
        let mut engine = StyleTemplateEngine::new();
        engine.set_from_reference_image(reference()).unwrap();
        let err = engine.derive_from_first_frame("a ninja").unwrap_err();
        assert_eq!(err, StyleError::AlreadySet(TemplateSource::ReferenceImage));
        assert_eq!(engine.source(), TemplateSource::ReferenceImage);
    }

    #[test]
    fn reference_locks_and_rejects_second_lock() {
        let mut engine = StyleTemplateEngine::new();
        engine.derive_from_first_frame("a ninja").unwrap();
        assert_eq!(
            engine.set_from_reference_image(reference()).unwrap_err(),
            StyleError::Locked(TemplateSource::FirstFrame)
        );
        assert!(engine.reference_image().is_none());
    }

    #[test]
    fn reference_replaces_manual_template() {
        let mut engine = StyleTemplateEngine::new();
        engine.set_manual("watercolor", None).unwrap();
        let template = engine.set_from_reference_image(reference()).unwrap();
        assert_eq!(template.text, REFERENCE_TEMPLATE_TEXT);
        assert!(engine.reference_image().is_some());
    }

    #[test]
    fn manual_overrides_lock() {
        let mut engine = StyleTemplateEngine::new();
        engine.set_from_reference_image(reference()).unwrap();
        let template = engine
            .set_manual("ink wash, heavy shadows", Some("a tall samurai"))
            .unwrap()
            .clone();
        assert_eq!(template.source, TemplateSource::Manual);
        assert_eq!(
            template.text,
            "ink wash, heavy shadows. Main character: a tall samurai."
        );
        assert_eq!(template.character_hint.as_deref(), Some("a tall samurai"));
        assert!(!engine.is_locked());
    }

    #[test]
    fn manual_requires_some_text() {
        let mut engine = StyleTemplateEngine::new();
        assert_eq!(engine.set_manual("   ", Some(" ")).unwrap_err(), StyleError::Empty);
        assert!(engine.current_template().is_none());
    }

    #[test]
    fn reset_clears_template_and_reference() {
        let mut engine = StyleTemplateEngine::new();
        engine.set_from_reference_image(reference()).unwrap();
        engine.reset();
        assert!(engine.current_template().is_none());
        assert!(engine.reference_image().is_none());
        engine.derive_from_first_frame("a ninja").unwrap();
    }

    #[test]
    fn applicability_by_source() {
        let first = StyleTemplate {
            source: TemplateSource::FirstFrame,
            text: "x".into(),
            character_hint: None,
        };
        assert!(!first.applies(false));
        assert!(first.applies(true));
        let manual = StyleTemplate {
            source: TemplateSource::Manual,
            ..first.clone()
        };
        assert!(manual.applies(false));
    }
}
