use ai_pipeline::StyleError;
use project::{FrameId, ProjectId};
use thiserror::Error;

/// Reasons a session action was refused. A refused action never mutates
/// session state or triggers a save.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("no project is open")]
    NoActiveProject,
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),
    #[error("frame not found: {0}")]
    FrameNotFound(FrameId),
    #[error("a generation is already in progress")]
    Busy,
    #[error("there is no draft frame")]
    NoDraft,
    #[error(transparent)]
    Style(#[from] StyleError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
