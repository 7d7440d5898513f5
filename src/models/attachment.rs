use serde::{Deserialize, Serialize};

use super::{NoteId, ResourceId, WorkspaceId};

/// One reference row linking a note to a resource file.
///
/// Several rows may point at the same resource; each note holds its own
/// independent association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub workspace_id: WorkspaceId,
    pub note_id: NoteId,
    pub resource_id: ResourceId,
}
