/// Export of committed frames to external destinations
///
/// Every destination implements [`ExportSink`]; `export_project` walks a
/// project's frames in order and reports how many made it.
use project::{Frame, Project};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod directory;
pub mod drive;
pub mod source;

pub use directory::DirectoryExporter;
pub use drive::{DriveUploader, DRIVE_ROOT_FOLDER};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid image data: {0}")]
    InvalidImage(String),
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// One frame image handed to a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    pub image_url: String,
    pub file_name: String,
    pub project_name: String,
    pub description: String,
}

impl ExportItem {
    pub fn for_frame(project_name: &str, frame: &Frame) -> Self {
        Self {
            image_url: frame.image_url.clone(),
            file_name: frame_file_name(frame.order),
            project_name: project_name.to_string(),
            description: frame.description.clone(),
        }
    }
}

/// Destination for exported frame images.
///
/// Implementations report failure as `false` and log the cause; a failed
/// upload never affects the project.
#[async_trait::async_trait]
pub trait ExportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(&self, item: &ExportItem) -> bool;
}

/// File name used for a frame's exported image.
pub fn frame_file_name(order: u32) -> String {
    format!("frame-{order}.jpg")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload every committed frame of `project` in order.
pub async fn export_project(sink: &dyn ExportSink, project: &Project) -> ExportReport {
    let mut report = ExportReport::default();
    for frame in &project.frames {
        let item = ExportItem::for_frame(&project.name, frame);
        if sink.upload(&item).await {
            report.uploaded.push(item.file_name);
        } else {
            report.failed.push(item.file_name);
        }
    }
    tracing::info!(
        target: "export",
        "{}: exported {} of {} frame(s) of {}",
        sink.name(),
        report.uploaded.len(),
        project.frames.len(),
        project.name
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        reject: Option<String>,
        seen: Mutex<Vec<ExportItem>>,
    }

    #[async_trait::async_trait]
    impl ExportSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn upload(&self, item: &ExportItem) -> bool {
            self.seen.lock().unwrap().push(item.clone());
            self.reject.as_deref() != Some(item.file_name.as_str())
        }
    }

    fn project_with_frames() -> Project {
        let mut project = Project::new("Alpha");
        for (i, d) in ["one", "two", "three"].into_iter().enumerate() {
            project.commit_frame(Frame::draft(format!("https://img/{i}"), d.into(), 0));
        }
        project
    }

    #[test]
    fn file_name_uses_order() {
        assert_eq!(frame_file_name(1), "frame-1.jpg");
        assert_eq!(frame_file_name(12), "frame-12.jpg");
    }

    #[tokio::test]
    async fn exports_frames_in_order() {
        let sink = RecordingSink::default();
        let report = export_project(&sink, &project_with_frames()).await;
        assert!(report.is_complete());
        assert_eq!(report.uploaded, vec!["frame-1.jpg", "frame-2.jpg", "frame-3.jpg"]);

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen[1].description, "two");
        assert_eq!(seen[1].project_name, "Alpha");
        assert_eq!(seen[1].image_url, "https://img/1");
    }

    #[tokio::test]
    async fn failures_are_reported_not_fatal() {
        let sink = RecordingSink {
            reject: Some("frame-2.jpg".into()),
            ..Default::default()
        };
        let report = export_project(&sink, &project_with_frames()).await;
        assert_eq!(report.uploaded, vec!["frame-1.jpg", "frame-3.jpg"]);
        assert_eq!(report.failed, vec!["frame-2.jpg"]);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn empty_project_exports_nothing() {
        let sink = RecordingSink::default();
        let report = export_project(&sink, &Project::new("Empty")).await;
        assert_eq!(report, ExportReport::default());
    }
}
