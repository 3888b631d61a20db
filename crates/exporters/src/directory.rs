/// Export frames into a local folder tree
///
/// Layout: `<root>/<sanitized project name>/frame-<order>.jpg` plus a
/// `manifest.json` listing each file with its description.
use crate::source::fetch_image;
use crate::{ExportError, ExportItem, ExportSink};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]+"#).unwrap());

/// Folder name for a project; never empty and never a path traversal.
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file_name: String,
    pub description: String,
    pub source_url: String,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub project_name: String,
    #[serde(default)]
    pub frames: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn upsert(&mut self, entry: ManifestEntry) {
        match self.frames.iter_mut().find(|e| e.file_name == entry.file_name) {
            Some(existing) => *existing = entry,
            None => self.frames.push(entry),
        }
    }
}

pub struct DirectoryExporter {
    root: PathBuf,
    client: reqwest::Client,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn project_dir(&self, project_name: &str) -> PathBuf {
        self.root.join(sanitize_folder_name(project_name))
    }

    async fn write_item(&self, item: &ExportItem) -> Result<PathBuf, ExportError> {
        let bytes = fetch_image(&self.client, &item.image_url).await?;
        let dir = self.project_dir(&item.project_name);
        tokio::fs::create_dir_all(&dir).await?;
        let target = dir.join(sanitize_folder_name(&item.file_name));
        tokio::fs::write(&target, &bytes).await?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let mut manifest = if manifest_path.exists() {
            Manifest::load(&manifest_path).unwrap_or_else(|err| {
                tracing::warn!(target: "export", "Rewriting unreadable manifest {}: {}", manifest_path.display(), err);
                Manifest::default()
            })
        } else {
            Manifest::default()
        };
        manifest.project_name = item.project_name.clone();
        manifest.upsert(ManifestEntry {
            file_name: item.file_name.clone(),
            description: item.description.clone(),
            source_url: summarize_url(&item.image_url),
            exported_at: Utc::now(),
        });
        tokio::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).await?;
        Ok(target)
    }
}

/// Data URLs are too large to be useful in the manifest.
fn summarize_url(url: &str) -> String {
    match url.split_once(',') {
        Some((header, _)) if url.starts_with("data:") => format!("{header},..."),
        _ => url.to_string(),
    }
}

#[async_trait::async_trait]
impl ExportSink for DirectoryExporter {
    fn name(&self) -> &str {
        "directory"
    }

    async fn upload(&self, item: &ExportItem) -> bool {
        match self.write_item(item).await {
            Ok(path) => {
                tracing::debug!(target: "export", "Wrote {}", path.display());
                true
            }
            Err(err) => {
                tracing::error!(target: "export", "Export of {} failed: {}", item.file_name, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_folder_names() {
        assert_eq!(sanitize_folder_name("Alpha"), "Alpha");
        assert_eq!(sanitize_folder_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_folder_name(".."), "untitled");
        assert_eq!(sanitize_folder_name("   "), "untitled");
        assert_eq!(sanitize_folder_name(" Night Walk? "), "Night Walk_");
    }

    #[test]
    fn manifest_keeps_data_urls_short() {
        assert_eq!(summarize_url("data:image/png;base64,AAAA"), "data:image/png;base64,...");
        assert_eq!(summarize_url("https://x/y.png"), "https://x/y.png");
    }
}
