use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Project identifier.
///
/// Stored as an opaque string so lists written by older clients (which used
/// millisecond timestamps as ids) still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Frame identifier, unique within the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One generated image and the description it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: FrameId,
    pub image_url: String,
    pub description: String,
    pub is_finalized: bool,
    /// 1-based position within the owning project.
    pub order: u32,
}

impl Frame {
    /// Create an unfinalized draft frame.
    pub fn draft(image_url: String, description: String, order: u32) -> Self {
        Self {
            id: FrameId::new(),
            image_url,
            description,
            is_finalized: false,
            order,
        }
    }
}

/// An ordered strip of committed frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            frames: Vec::new(),
            created_at: now,
            last_modified: now,
        }
    }

    /// Order the next committed frame will receive.
    pub fn next_order(&self) -> u32 {
        self.frames.len() as u32 + 1
    }

    pub fn frame(&self, id: &FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| &f.id == id)
    }

    /// Append a frame as finalized, assigning it the next order.
    pub fn commit_frame(&mut self, mut frame: Frame) -> &Frame {
        frame.is_finalized = true;
        frame.order = self.next_order();
        self.frames.push(frame);
        self.touch();
        &self.frames[self.frames.len() - 1]
    }

    /// Remove a frame and close the gap it leaves.
    pub fn remove_frame(&mut self, id: &FrameId) -> Option<Frame> {
        let idx = self.frames.iter().position(|f| &f.id == id)?;
        let removed = self.frames.remove(idx);
        self.renumber();
        self.touch();
        Some(removed)
    }

    /// Reassign orders to `1..=N` following array position.
    pub fn renumber(&mut self) {
        for (idx, frame) in self.frames.iter_mut().enumerate() {
            frame.order = idx as u32 + 1;
        }
    }

    pub fn has_contiguous_order(&self) -> bool {
        self.frames
            .iter()
            .enumerate()
            .all(|(idx, f)| f.order == idx as u32 + 1)
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(descriptions: &[&str]) -> Project {
        let mut project = Project::new("Alpha");
        for d in descriptions {
            project.commit_frame(Frame::draft(format!("https://img/{d}"), d.to_string(), 99));
        }
        project
    }

    #[test]
    fn commit_assigns_next_order_and_finalizes() {
        let project = project_with(&["one", "two", "three"]);
        let orders: Vec<u32> = project.frames.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert!(project.frames.iter().all(|f| f.is_finalized));
        assert_eq!(project.next_order(), 4);
    }

    #[test]
    fn remove_frame_renumbers_preserving_relative_order() {
        let mut project = project_with(&["one", "two", "three", "four"]);
        let second = project.frames[1].id.clone();
        let removed = project.remove_frame(&second).unwrap();
        assert_eq!(removed.description, "two");

        let described: Vec<(&str, u32)> = project
            .frames
            .iter()
            .map(|f| (f.description.as_str(), f.order))
            .collect();
        assert_eq!(described, vec![("one", 1), ("three", 2), ("four", 3)]);
        assert!(project.has_contiguous_order());
    }

    #[test]
    fn remove_unknown_frame_is_none() {
        let mut project = project_with(&["one"]);
        let before = project.last_modified;
        assert!(project.remove_frame(&FrameId::from("missing")).is_none());
        assert_eq!(project.last_modified, before);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let project = project_with(&["moon"]);
        let json = serde_json::to_value(&project).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("lastModified").is_some());
        let frame = &json["frames"][0];
        assert_eq!(frame["isFinalized"], true);
        assert_eq!(frame["order"], 1);
        assert_eq!(frame["imageUrl"], "https://img/moon");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
        assert_ne!(FrameId::new(), FrameId::new());
    }
}
