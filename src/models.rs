mod attachment;
mod ids;
mod note;
mod workspace;

pub use attachment::AttachmentRef;
pub use ids::{NoteId, ResourceId, WorkspaceId};
pub use note::{Note, NoteBuilder, NoteContent, NoteContentPatch};
pub use workspace::{NewWorkspace, Workspace, WorkspacePatch};
