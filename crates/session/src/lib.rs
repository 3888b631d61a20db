/// Editing session for manga strips
///
/// Owns the project list, the active project, the uncommitted draft frame and
/// the style template, and persists every committed change.
pub mod error;
pub mod session;

pub use error::{Result, SessionError};
pub use session::{Completion, GenerationKind, GenerationTicket, ProjectSession, SessionState};
