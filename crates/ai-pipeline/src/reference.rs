use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference image is empty")]
    Empty,
    #[error("unsupported reference image: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded reference image, held as a `data:` URL.
///
/// The handle doubles as a displayable image URL and as the input that locks
/// the style template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    data_url: String,
    mime: String,
    byte_len: usize,
}

impl ReferenceImage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReferenceError> {
        if bytes.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let format = image::guess_format(bytes)
            .map_err(|err| ReferenceError::UnsupportedFormat(err.to_string()))?;
        let mime = format.to_mime_type().to_string();
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
        Ok(Self {
            data_url,
            mime,
            byte_len: bytes.len(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}
