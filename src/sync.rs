//! Mutate-then-sync ordering for the replicated backing store.
//!
//! [`Synced`] wraps any store and calls a [`Durability`] primitive exactly
//! once after each successful mutation. Reads pass straight through. A failed
//! mutation never triggers a sync.

use crate::{
    AttachmentRepository, Database, Error, NewWorkspace, Note, NoteContent, NoteContentPatch,
    NoteId, NoteQuery, NoteRepository, ResourceId, Result, Workspace, WorkspaceId, WorkspacePatch,
    WorkspaceRepository,
};

/// Pushes locally committed changes to durable or replicated storage.
///
/// How replication works is up to the implementation; callers only rely on
/// `sync` returning once the step is done.
pub trait Durability {
    fn sync(&self) -> anyhow::Result<()>;
}

impl<T: Durability + ?Sized> Durability for &T {
    fn sync(&self) -> anyhow::Result<()> {
        (**self).sync()
    }
}

/// Checkpoints the write-ahead log into the main database file.
impl Durability for Database {
    fn sync(&self) -> anyhow::Result<()> {
        let (busy, log_frames, checkpointed): (i64, i64, i64) = self.connection().query_row(
            "PRAGMA wal_checkpoint(FULL)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        if busy != 0 {
            anyhow::bail!("wal checkpoint blocked ({checkpointed}/{log_frames} frames written)");
        }
        Ok(())
    }
}

/// Adapts a closure into a [`Durability`] primitive.
///
/// # Examples
///
/// ```
/// use inkvault::{Durability, FnDurability};
///
/// let noop = FnDurability::new(|| Ok(()));
/// assert!(noop.sync().is_ok());
/// ```
pub struct FnDurability<F>(F);

impl<F> FnDurability<F>
where
    F: Fn() -> anyhow::Result<()>,
{
    pub fn new(sync: F) -> Self {
        Self(sync)
    }
}

impl<F> Durability for FnDurability<F>
where
    F: Fn() -> anyhow::Result<()>,
{
    fn sync(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

/// A store decorated with a post-mutation sync.
pub struct Synced<S, D> {
    inner: S,
    durability: D,
}

impl<S, D: Durability> Synced<S, D> {
    pub fn new(inner: S, durability: D) -> Self {
        Self { inner, durability }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Runs the sync step alone, e.g. after a [`Error::DurabilitySync`].
    pub fn resync(&self) -> Result<()> {
        self.sync_with(None)
    }

    fn sync_with(&self, committed: Option<String>) -> Result<()> {
        self.durability.sync().map_err(|source| {
            tracing::warn!(error = %source, committed = ?committed, "durability sync failed after committed mutation");
            Error::DurabilitySync { committed, source }
        })
    }

    fn synced<T>(&self, result: Result<T>) -> Result<T> {
        let value = result?;
        self.sync_with(None)?;
        Ok(value)
    }

    fn synced_id<T: ToString>(&self, result: Result<T>) -> Result<T> {
        let id = result?;
        self.sync_with(Some(id.to_string()))?;
        Ok(id)
    }
}

impl<S: NoteRepository, D: Durability> NoteRepository for Synced<S, D> {
    fn add(&self, content: NoteContent) -> Result<NoteId> {
        self.synced_id(self.inner.add(content))
    }

    fn update(&self, id: &NoteId, patch: NoteContentPatch) -> Result<()> {
        self.synced(self.inner.update(id, patch))
    }

    fn get(&self, query: NoteQuery) -> Result<Vec<Note>> {
        self.inner.get(query)
    }

    fn get_by_ids(&self, ids: &[NoteId]) -> Result<Vec<Note>> {
        self.inner.get_by_ids(ids)
    }

    fn get_length(&self) -> Result<u64> {
        self.inner.get_length()
    }

    fn delete(&self, ids: &[NoteId]) -> Result<()> {
        self.synced(self.inner.delete(ids))
    }

    fn get_by_id(&self, id: &NoteId) -> Result<Option<Note>> {
        self.inner.get_by_id(id)
    }
}

impl<S: WorkspaceRepository, D: Durability> WorkspaceRepository for Synced<S, D> {
    fn create(&self, workspace: NewWorkspace) -> Result<WorkspaceId> {
        self.synced_id(self.inner.create(workspace))
    }

    fn get(&self, id: &WorkspaceId) -> Result<Option<Workspace>> {
        self.inner.get(id)
    }

    fn get_list(&self) -> Result<Vec<Workspace>> {
        self.inner.get_list()
    }

    fn update(&self, id: &WorkspaceId, patch: WorkspacePatch) -> Result<()> {
        self.synced(self.inner.update(id, patch))
    }

    fn delete(&self, ids: &[WorkspaceId]) -> Result<()> {
        self.synced(self.inner.delete(ids))
    }
}

impl<S: AttachmentRepository, D: Durability> AttachmentRepository for Synced<S, D> {
    fn set(&self, target: &NoteId, resources: &[ResourceId]) -> Result<()> {
        self.synced(self.inner.set(target, resources))
    }

    fn get(&self, target: &NoteId) -> Result<Vec<ResourceId>> {
        self.inner.get(target)
    }

    fn delete(&self, resources: &[ResourceId]) -> Result<()> {
        self.synced(self.inner.delete(resources))
    }

    fn find_orphaned_resources(&self, resources: &[ResourceId]) -> Result<Vec<ResourceId>> {
        self.inner.find_orphaned_resources(resources)
    }
}
