use crate::kv::KeyValueStore;
use crate::model::Project;
use crate::StoreError;

/// Key under which the full project list is stored.
pub const PROJECTS_KEY: &str = "comic-projects";

/// Durable persistence of the full project list.
pub struct ProjectStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl ProjectStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            key: PROJECTS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Load every stored project.
    ///
    /// Missing, unreadable or malformed data yields an empty list. Frames
    /// whose orders drifted from their positions are renumbered.
    pub fn load(&self) -> Vec<Project> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(target: "store", "Project store unreadable, starting empty: {}", err);
                return Vec::new();
            }
        };
        let mut projects: Vec<Project> = match serde_json::from_str(&raw) {
            Ok(projects) => projects,
            Err(err) => {
                tracing::warn!(target: "store", "Stored projects malformed, starting empty: {}", err);
                return Vec::new();
            }
        };
        for project in &mut projects {
            if !project.has_contiguous_order() {
                tracing::warn!(
                    target: "store",
                    "Renumbering frames of project {} ({})",
                    project.id,
                    project.name
                );
                project.renumber();
            }
            for frame in &mut project.frames {
                frame.is_finalized = true;
            }
        }
        tracing::debug!(target: "store", "Loaded {} project(s)", projects.len());
        projects
    }

    /// Overwrite the stored list with `projects`.
    pub fn save(&self, projects: &[Project]) -> Result<(), StoreError> {
        let json = serde_json::to_string(projects)?;
        self.backend.set(&self.key, &json)?;
        tracing::debug!(target: "store", "Saved {} project(s)", projects.len());
        Ok(())
    }
}
