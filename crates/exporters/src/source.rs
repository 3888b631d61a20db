/// Resolve a frame's image URL to bytes
use crate::ExportError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::PathBuf;

/// Where a frame's image lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocation {
    /// Inline `data:<mime>;base64,<payload>`
    Inline { mime: String, payload: String },
    Remote(String),
    Local(PathBuf),
}

impl ImageLocation {
    pub fn parse(url: &str) -> Result<Self, ExportError> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| ExportError::InvalidImage("data URL has no payload".into()))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| ExportError::InvalidImage("only base64 data URLs are supported".into()))?;
            return Ok(Self::Inline {
                mime: mime.to_string(),
                payload: payload.to_string(),
            });
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Self::Remote(url.to_string()));
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        if path.is_empty() {
            return Err(ExportError::InvalidImage("empty image URL".into()));
        }
        Ok(Self::Local(PathBuf::from(path)))
    }

    /// MIME type when it is known without fetching.
    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::Inline { mime, .. } => Some(mime),
            _ => None,
        }
    }
}

/// Load the image bytes behind `url`.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, ExportError> {
    match ImageLocation::parse(url)? {
        ImageLocation::Inline { payload, .. } => STANDARD
            .decode(payload.as_bytes())
            .map_err(|err| ExportError::InvalidImage(format!("bad base64 payload: {err}"))),
        ImageLocation::Remote(url) => {
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ExportError::Rejected(format!(
                    "fetching {url} returned HTTP {}",
                    response.status()
                )));
            }
            Ok(response.bytes().await?.to_vec())
        }
        ImageLocation::Local(path) => Ok(tokio::fs::read(path).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locations() {
        assert_eq!(
            ImageLocation::parse("data:image/png;base64,AAAA").unwrap(),
            ImageLocation::Inline {
                mime: "image/png".into(),
                payload: "AAAA".into()
            }
        );
        assert_eq!(
            ImageLocation::parse("https://images.pexels.com/x.jpeg").unwrap(),
            ImageLocation::Remote("https://images.pexels.com/x.jpeg".into())
        );
        assert_eq!(
            ImageLocation::parse("file:///tmp/a.png").unwrap(),
            ImageLocation::Local(PathBuf::from("/tmp/a.png"))
        );
        assert!(ImageLocation::parse("data:image/png,raw").is_err());
        assert!(ImageLocation::parse("  ").is_err());
    }

    #[tokio::test]
    async fn decodes_inline_images() {
        let client = reqwest::Client::new();
        let bytes = fetch_image(&client, "data:image/png;base64,aGVsbG8=").await.unwrap();
        assert_eq!(bytes, b"hello");
        assert!(fetch_image(&client, "data:image/png;base64,@@@").await.is_err());
    }

    #[tokio::test]
    async fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"pixels").unwrap();
        let client = reqwest::Client::new();
        let bytes = fetch_image(&client, path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"pixels");
    }
}
