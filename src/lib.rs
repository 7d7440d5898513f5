pub mod attachments;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod loader;
pub mod models;
pub mod notes;
pub mod sync;
pub mod workspaces;

pub use attachments::{AttachmentLedger, AttachmentRepository};
pub use cache::EvictingMap;
pub use cleanup::{PurgeReport, ResourceFileStore, collect_garbage, delete_notes, purge_workspace};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use events::{EventBus, WorkspaceEvent};
pub use loader::ViewportDataLoader;
pub use models::{
    AttachmentRef, NewWorkspace, Note, NoteBuilder, NoteContent, NoteContentPatch, NoteId,
    ResourceId, Workspace, WorkspaceId, WorkspacePatch,
};
pub use notes::{NoteOrder, NoteQuery, NoteRepository, NoteStore};
pub use sync::{Durability, FnDurability, Synced};
pub use workspaces::{WorkspaceRepository, WorkspaceStore};
