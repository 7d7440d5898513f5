use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{NoteId, WorkspaceId};

/// The user-facing content of a note.
///
/// The data layer treats both fields as opaque text; the editor owns their
/// internal format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub title: String,
    pub text: String,
}

impl NoteContent {
    /// Creates note content from a title and body.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A partial update of [`NoteContent`].
///
/// Fields left as `None` keep their stored value.
///
/// # Examples
///
/// ```
/// use inkvault::{NoteContent, NoteContentPatch};
///
/// let mut content = NoteContent::new("Draft", "body");
/// NoteContentPatch::title("Final").apply_to(&mut content);
///
/// assert_eq!(content.title, "Final");
/// assert_eq!(content.text, "body");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContentPatch {
    pub title: Option<String>,
    pub text: Option<String>,
}

impl NoteContentPatch {
    /// A patch replacing only the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            text: None,
        }
    }

    /// A patch replacing only the body.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            title: None,
            text: Some(text.into()),
        }
    }

    /// Returns true when the patch carries no fields.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.text.is_none()
    }

    /// Merges the supplied fields onto `content`.
    pub fn apply_to(self, content: &mut NoteContent) {
        if let Some(title) = self.title {
            content.title = title;
        }
        if let Some(text) = self.text {
            content.text = text;
        }
    }
}

impl From<NoteContent> for NoteContentPatch {
    fn from(content: NoteContent) -> Self {
        Self {
            title: Some(content.title),
            text: Some(content.text),
        }
    }
}

/// A note stored in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    workspace_id: WorkspaceId,
    content: NoteContent,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl Note {
    pub fn id(&self) -> &NoteId {
        &self.id
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    pub fn content(&self) -> &NoteContent {
        &self.content
    }

    /// When the note was inserted. Never changes afterwards.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// When the note content last changed.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use inkvault::{NoteBuilder, NoteContent, NoteId, WorkspaceId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new("n1"))
///     .workspace_id(WorkspaceId::new("ws"))
///     .content(NoteContent::new("Title", "Text"))
///     .build();
///
/// assert_eq!(note.id().as_str(), "n1");
/// assert_eq!(note.content().title, "Title");
/// assert_eq!(note.created_at(), note.updated_at());
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    workspace_id: Option<WorkspaceId>,
    content: Option<NoteContent>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the owning workspace.
    pub fn workspace_id(mut self, workspace_id: WorkspaceId) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: NoteContent) -> Self {
        self.content = Some(content);
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// Missing timestamps default to one shared "now", so a note built
    /// without them satisfies `updated_at >= created_at`.
    ///
    /// # Panics
    ///
    /// Panics if `id` or `workspace_id` have not been set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        let created_at = self.created_at.unwrap_or(now);
        Note {
            id: self.id.expect("id is required"),
            workspace_id: self.workspace_id.expect("workspace_id is required"),
            content: self.content.unwrap_or_default(),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}
