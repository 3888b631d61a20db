use crate::error::{Result, SessionError};
use ai_pipeline::{
    GenerationOutcome, GenerationPipeline, GenerationRequest, ImageModel, ReferenceImage,
    StyleTemplate, StyleTemplateEngine, TemplateSource,
};
use project::{Frame, FrameId, Project, ProjectId, ProjectStore};

/// Workflow state of the editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoProject,
    /// A project is open and there is no draft
    Browsing,
    /// A generation is in flight
    DraftPending,
    /// A draft has an image and awaits finalize or regenerate
    DraftReady,
    /// Transient while a draft is committed
    Finalizing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationKind {
    NewFrame,
    Regenerate { frame_id: FrameId },
}

/// Handle for one in-flight generation.
///
/// Returned by `begin_generate`/`begin_regenerate`; run
/// `GenerationPipeline::generate(ticket.request())` and hand the outcome back
/// to `complete_generation`.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    id: u64,
    project_id: ProjectId,
    kind: GenerationKind,
    request: GenerationRequest,
}

impl GenerationTicket {
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn kind(&self) -> &GenerationKind {
        &self.kind
    }
}

/// What became of a completed generation
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The draft now holds the new image
    Ready(Frame),
    /// The session moved on while the call was in flight; nothing changed
    Stale,
}

#[derive(Debug, Clone)]
struct PendingGeneration {
    ticket_id: u64,
    project_id: ProjectId,
}

/// The single active editing context.
pub struct ProjectSession {
    store: ProjectStore,
    pipeline: GenerationPipeline,
    style: StyleTemplateEngine,
    projects: Vec<Project>,
    active: Option<ProjectId>,
    draft: Option<Frame>,
    pending: Option<PendingGeneration>,
    next_ticket: u64,
    state: SessionState,
    notice: Option<String>,
    model: ImageModel,
}

impl ProjectSession {
    /// Open a session over the projects currently in `store`.
    pub fn open(store: ProjectStore, pipeline: GenerationPipeline) -> Self {
        let projects = store.load();
        tracing::info!(target: "session", "Session opened with {} project(s)", projects.len());
        Self {
            store,
            pipeline,
            style: StyleTemplateEngine::new(),
            projects,
            active: None,
            draft: None,
            pending: None,
            next_ticket: 1,
            state: SessionState::NoProject,
            notice: None,
            model: ImageModel::default(),
        }
    }

    pub fn with_model(mut self, model: ImageModel) -> Self {
        self.model = model;
        self
    }

    // ---- read access ----

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    pub fn active_project_id(&self) -> Option<&ProjectId> {
        self.active.as_ref()
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.active.as_ref().and_then(|id| self.project(id))
    }

    pub fn draft(&self) -> Option<&Frame> {
        self.draft.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn style_template(&self) -> Option<&StyleTemplate> {
        self.style.current_template()
    }

    pub fn style_engine(&self) -> &StyleTemplateEngine {
        &self.style
    }

    /// Transient message from the last failed generation or save.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.pipeline.is_ai_enabled()
    }

    pub fn model(&self) -> ImageModel {
        self.model
    }

    pub fn set_model(&mut self, model: ImageModel) {
        self.model = model;
    }

    // ---- projects ----

    pub fn create_project(&mut self, name: &str) -> Result<ProjectId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation("project name is blank"));
        }
        let project = Project::new(name);
        let id = project.id.clone();
        tracing::info!(target: "session", "Created project {} ({})", id, name);
        self.projects.push(project);
        // A reference or manual style held at this point was meant for the new project.
        if self.style.source() == TemplateSource::FirstFrame {
            self.style.reset();
        }
        self.enter_project(id.clone());
        self.notice = None;
        self.persist();
        Ok(id)
    }

    pub fn select_project(&mut self, id: &ProjectId) -> Result<()> {
        if self.project(id).is_none() {
            return Err(SessionError::ProjectNotFound(id.clone()));
        }
        if self.active.as_ref() != Some(id) {
            self.style.reset();
            self.enter_project(id.clone());
        }
        self.notice = None;
        Ok(())
    }

    /// Leave the open project, discarding any draft.
    pub fn close_project(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.leave_project();
    }

    pub fn delete_project(&mut self, id: &ProjectId) -> Result<Project> {
        let idx = self
            .projects
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| SessionError::ProjectNotFound(id.clone()))?;
        let removed = self.projects.remove(idx);
        if self.active.as_ref() == Some(id) {
            self.leave_project();
        }
        tracing::info!(target: "session", "Deleted project {} ({})", removed.id, removed.name);
        self.notice = None;
        self.persist();
        Ok(removed)
    }

    // ---- generation ----

    /// Start generating a new draft frame. A held draft is replaced on
    /// completion.
    pub fn begin_generate(&mut self, description: &str) -> Result<GenerationTicket> {
        let description = description.trim();
        if description.is_empty() {
            return Err(SessionError::Validation("description is blank"));
        }
        let project_id = self.active.clone().ok_or(SessionError::NoActiveProject)?;
        if self.pending.is_some() {
            return Err(SessionError::Busy);
        }
        Ok(self.issue_ticket(project_id, GenerationKind::NewFrame, description))
    }

    /// Start replacing the draft's image and description.
    pub fn begin_regenerate(&mut self, description: &str) -> Result<GenerationTicket> {
        let project_id = self.active.clone().ok_or(SessionError::NoActiveProject)?;
        if self.pending.is_some() {
            return Err(SessionError::Busy);
        }
        let frame_id = self.draft.as_ref().ok_or(SessionError::NoDraft)?.id.clone();
        let description = description.trim();
        if description.is_empty() {
            return Err(SessionError::Validation("description is blank"));
        }
        Ok(self.issue_ticket(project_id, GenerationKind::Regenerate { frame_id }, description))
    }

    /// Apply a finished generation.
    ///
    /// Results for a project or draft the session has since left are
    /// discarded without touching any state.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: GenerationOutcome,
    ) -> Result<Completion> {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|p| p.ticket_id == ticket.id && p.project_id == ticket.project_id);
        if !matches {
            tracing::debug!(target: "session", "Discarding stale generation #{}", ticket.id);
            return Ok(Completion::Stale);
        }
        self.pending = None;

        if self.active.as_ref() != Some(&ticket.project_id) {
            tracing::debug!(target: "session", "Active project changed; discarding generation #{}", ticket.id);
            self.state = self.resting_state();
            return Ok(Completion::Stale);
        }

        let description = ticket.request.description;
        let frame = match ticket.kind {
            GenerationKind::NewFrame => {
                let order = self
                    .active_project()
                    .map(Project::next_order)
                    .unwrap_or(1);
                Frame::draft(outcome.image_url, description, order)
            }
            GenerationKind::Regenerate { frame_id } => {
                let Some(current) = self.draft.as_ref().filter(|d| d.id == frame_id) else {
                    self.state = self.resting_state();
                    return Ok(Completion::Stale);
                };
                Frame {
                    image_url: outcome.image_url,
                    description,
                    ..current.clone()
                }
            }
        };
        self.draft = Some(frame.clone());
        self.notice = outcome.notice;
        self.state = SessionState::DraftReady;
        tracing::debug!(target: "session", "Draft {} ready (order {})", frame.id, frame.order);
        Ok(Completion::Ready(frame))
    }

    pub async fn generate(&mut self, description: &str) -> Result<Completion> {
        let ticket = self.begin_generate(description)?;
        let outcome = self.pipeline.generate(ticket.request()).await;
        self.complete_generation(ticket, outcome)
    }

    pub async fn regenerate(&mut self, description: &str) -> Result<Completion> {
        let ticket = self.begin_regenerate(description)?;
        let outcome = self.pipeline.generate(ticket.request()).await;
        self.complete_generation(ticket, outcome)
    }

    // ---- frames ----

    /// Commit the draft as the project's next frame.
    pub fn finalize_frame(&mut self) -> Result<Frame> {
        let active = self.active.clone().ok_or(SessionError::NoActiveProject)?;
        if self.pending.is_some() {
            return Err(SessionError::Busy);
        }
        let idx = self
            .projects
            .iter()
            .position(|p| p.id == active)
            .ok_or_else(|| SessionError::ProjectNotFound(active.clone()))?;
        let draft = self.draft.take().ok_or(SessionError::NoDraft)?;
        self.state = SessionState::Finalizing;

        if self.projects[idx].frames.is_empty() && self.style.current_template().is_none() {
            if let Err(err) = self.style.derive_from_first_frame(&draft.description) {
                tracing::warn!(target: "session", "Could not derive style template: {}", err);
            }
        }
        let committed = self.projects[idx].commit_frame(draft).clone();
        tracing::info!(
            target: "session",
            "Finalized frame {} of project {}",
            committed.order,
            active
        );
        self.state = SessionState::Browsing;
        self.notice = None;
        self.persist();
        Ok(committed)
    }

    /// Remove a committed frame and renumber the rest.
    pub fn delete_frame(&mut self, frame_id: &FrameId) -> Result<Frame> {
        let active = self.active.clone().ok_or(SessionError::NoActiveProject)?;
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == active)
            .ok_or_else(|| SessionError::ProjectNotFound(active.clone()))?;
        let removed = project
            .remove_frame(frame_id)
            .ok_or_else(|| SessionError::FrameNotFound(frame_id.clone()))?;
        let remaining = project.frames.len();
        let next_order = project.next_order();
        if let Some(draft) = self.draft.as_mut() {
            draft.order = next_order;
        }
        if remaining == 0 {
            self.style.reset();
        }
        tracing::info!(
            target: "session",
            "Deleted frame {} from project {} ({} left)",
            removed.order,
            active,
            remaining
        );
        self.notice = None;
        self.persist();
        Ok(removed)
    }

    // ---- style ----

    pub fn set_reference_image(&mut self, image: ReferenceImage) -> Result<&StyleTemplate> {
        self.style.set_from_reference_image(image)?;
        self.notice = None;
        self.style
            .current_template()
            .ok_or(SessionError::Validation("reference template missing"))
    }

    pub fn set_manual_style(&mut self, style_text: &str, character_text: Option<&str>) -> Result<&StyleTemplate> {
        self.style.set_manual(style_text, character_text)?;
        self.notice = None;
        self.style
            .current_template()
            .ok_or(SessionError::Validation("manual template missing"))
    }

    pub fn reset_style(&mut self) {
        self.style.reset();
    }

    // ---- internals ----

    fn issue_ticket(&mut self, project_id: ProjectId, kind: GenerationKind, description: &str) -> GenerationTicket {
        let has_committed_frames = self
            .project(&project_id)
            .is_some_and(|p| !p.frames.is_empty());
        let request = GenerationRequest::new(description)
            .with_template(self.style.current_template().cloned())
            .with_model(self.model)
            .with_committed_frames(has_committed_frames);
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some(PendingGeneration {
            ticket_id: id,
            project_id: project_id.clone(),
        });
        self.state = SessionState::DraftPending;
        tracing::debug!(target: "session", "Generation #{} started ({:?})", id, kind);
        GenerationTicket {
            id,
            project_id,
            kind,
            request,
        }
    }

    fn enter_project(&mut self, id: ProjectId) {
        self.draft = None;
        self.pending = None;
        self.state = SessionState::Browsing;
        self.restore_template(&id);
        self.active = Some(id);
    }

    /// Rebuild the first-frame template of a project that already has frames.
    fn restore_template(&mut self, id: &ProjectId) {
        if self.style.current_template().is_some() {
            return;
        }
        let Some(first) = self
            .projects
            .iter()
            .find(|p| &p.id == id)
            .and_then(|p| p.frames.first())
        else {
            return;
        };
        match self.style.derive_from_first_frame(&first.description) {
            Ok(_) => tracing::debug!(target: "session", "Restored style template for project {}", id),
            Err(err) => tracing::warn!(target: "session", "Could not restore style template: {}", err),
        }
    }

    fn leave_project(&mut self) {
        self.active = None;
        self.draft = None;
        self.pending = None;
        self.style.reset();
        self.state = SessionState::NoProject;
    }

    fn resting_state(&self) -> SessionState {
        match (&self.active, &self.draft) {
            (None, _) => SessionState::NoProject,
            (Some(_), Some(_)) => SessionState::DraftReady,
            (Some(_), None) => SessionState::Browsing,
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.projects) {
            tracing::error!(target: "session", "Failed to save projects: {}", err);
            self.notice = Some(format!("Could not save projects: {err}"));
        }
    }
}
