/// Google Drive export
///
/// Frames land in `Comic Strip Generator/<project name>`; both folders are
/// looked up first and created only when missing.
use crate::source::{fetch_image, ImageLocation};
use crate::{ExportError, ExportItem, ExportSink};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DRIVE_ROOT_FOLDER: &str = "Comic Strip Generator";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

pub struct DriveUploader {
    access_token: String,
    api_base: String,
    upload_base: String,
    client: reqwest::Client,
}

impl DriveUploader {
    pub fn new(access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            client,
        }
    }

    /// Point at a different Drive-compatible server.
    pub fn with_endpoints(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    pub async fn find_folder(&self, name: &str, parent: Option<&str>) -> Result<Option<String>, ExportError> {
        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("q", folder_query(name, parent).as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        let response = check(response).await?;
        let list: FileList = response.json().await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<String, ExportError> {
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME),
            parents: parent.map(|p| vec![p]),
            description: None,
        };
        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&metadata)
            .send()
            .await?;
        let created: FileRef = check(response).await?.json().await?;
        tracing::info!(target: "export", "Created Drive folder {} ({})", name, created.id);
        Ok(created.id)
    }

    async fn find_or_create(&self, name: &str, parent: Option<&str>) -> Result<String, ExportError> {
        match self.find_folder(name, parent).await? {
            Some(id) => Ok(id),
            None => self.create_folder(name, parent).await,
        }
    }

    /// Id of `Comic Strip Generator/<project_name>`.
    pub async fn project_folder(&self, project_name: &str) -> Result<String, ExportError> {
        let root = self.find_or_create(DRIVE_ROOT_FOLDER, None).await?;
        self.find_or_create(project_name, Some(&root)).await
    }

    async fn upload_item(&self, item: &ExportItem) -> Result<String, ExportError> {
        if self.access_token.trim().is_empty() {
            return Err(ExportError::Rejected("no Drive access token".into()));
        }
        let folder = self.project_folder(&item.project_name).await?;
        let bytes = fetch_image(&self.client, &item.image_url).await?;
        let mime = ImageLocation::parse(&item.image_url)?
            .mime()
            .unwrap_or("image/jpeg")
            .to_string();

        let metadata = FileMetadata {
            name: &item.file_name,
            mime_type: None,
            parents: Some(vec![folder.as_str()]),
            description: Some(&item.description),
        };
        let metadata_part = reqwest::multipart::Part::text(serde_json::to_string(&metadata)?)
            .mime_str("application/json")?;
        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(item.file_name.clone())
            .mime_str(&mime)?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .client
            .post(format!("{}/files?uploadType=multipart", self.upload_base))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: FileRef = check(response).await?.json().await?;
        Ok(uploaded.id)
    }
}

#[async_trait::async_trait]
impl ExportSink for DriveUploader {
    fn name(&self) -> &str {
        "google-drive"
    }

    async fn upload(&self, item: &ExportItem) -> bool {
        match self.upload_item(item).await {
            Ok(id) => {
                tracing::info!(target: "export", "Uploaded {} to Drive ({})", item.file_name, id);
                true
            }
            Err(err) => {
                tracing::error!(target: "export", "Drive upload of {} failed: {}", item.file_name, err);
                false
            }
        }
    }
}

/// Drive search expression for a non-trashed folder.
fn folder_query(name: &str, parent: Option<&str>) -> String {
    let mut query = format!(
        "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
        escape_query(name)
    );
    if let Some(parent) = parent {
        query.push_str(&format!(" and '{}' in parents", escape_query(parent)));
    }
    query
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ExportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExportError::Rejected(format!("Drive returned HTTP {status}: {body}")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_folder_query() {
        assert_eq!(
            folder_query(DRIVE_ROOT_FOLDER, None),
            "name='Comic Strip Generator' and mimeType='application/vnd.google-apps.folder' and trashed=false"
        );
    }

    #[test]
    fn project_folder_query_is_scoped_and_escaped() {
        let query = folder_query("Kenji's Walk", Some("root123"));
        assert!(query.starts_with("name='Kenji\\'s Walk'"));
        assert!(query.ends_with(" and 'root123' in parents"));
    }

    #[test]
    fn folder_metadata_shape() {
        let metadata = FileMetadata {
            name: "Alpha",
            mime_type: Some(FOLDER_MIME),
            parents: Some(vec!["root123"]),
            description: None,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["mimeType"], FOLDER_MIME);
        assert_eq!(json["parents"][0], "root123");
        assert!(json.get("description").is_none());
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let uploader = DriveUploader::new("  ").with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        let item = ExportItem {
            image_url: "data:image/png;base64,aGVsbG8=".into(),
            file_name: "frame-1.jpg".into(),
            project_name: "Alpha".into(),
            description: "a cat".into(),
        };
        assert!(matches!(uploader.upload_item(&item).await, Err(ExportError::Rejected(_))));
        assert!(!uploader.upload(&item).await);
    }

    #[tokio::test]
    async fn unreachable_server_reports_failure() {
        let uploader = DriveUploader::new("token").with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        let item = ExportItem {
            image_url: "data:image/png;base64,aGVsbG8=".into(),
            file_name: "frame-1.jpg".into(),
            project_name: "Alpha".into(),
            description: "a cat".into(),
        };
        assert!(!uploader.upload(&item).await);
    }
}
