//! Data models for Folio

mod conflict;
mod id;
mod member;
mod notebook;
mod session;

pub use conflict::{Conflict, ConflictBlock, ResolutionStrategy};
pub use id::{ConflictId, NotebookId, SessionToken, UserId, WorkspaceId};
pub use member::Role;
pub use notebook::{Notebook, VersionEntry};
pub use session::EditingSession;
