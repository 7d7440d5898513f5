//! Cross-entity cleanup that the individual stores deliberately leave out.
//!
//! Deleting a workspace through [`WorkspaceStore`] keeps its notes and
//! attachment rows, and deleting notes through [`NoteStore`] keeps their
//! attachment rows. [`purge_workspace`] and [`delete_notes`] remove the
//! dependent rows in the same transaction. [`collect_garbage`] deletes
//! resource files once no note references them.
//!
//! [`WorkspaceStore`]: crate::WorkspaceStore
//! [`NoteStore`]: crate::NoteStore

use std::collections::BTreeSet;

use crate::sync::Durability;
use crate::{
    AttachmentLedger, AttachmentRepository, Database, Error, NoteId, NoteRepository, NoteStore,
    ResourceId, Result, WorkspaceId,
};

/// Owner of resource file bytes, keyed by resource id.
pub trait ResourceFileStore {
    fn delete(&self, resources: &[ResourceId]) -> anyhow::Result<()>;
}

/// What [`purge_workspace`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub workspace_deleted: bool,
    pub notes_deleted: usize,
    pub attachments_deleted: usize,
    /// Resources the workspace referenced. Feed them to [`collect_garbage`]
    /// of any workspace that may share the files.
    pub released_resources: Vec<ResourceId>,
}

/// Deletes a workspace together with its notes and attachment rows in one
/// transaction, then syncs once when a durability primitive is given.
pub fn purge_workspace(
    db: &Database,
    workspace_id: &WorkspaceId,
    durability: Option<&dyn Durability>,
) -> Result<PurgeReport> {
    let tx = db.connection().unchecked_transaction()?;

    let released_resources = {
        let mut stmt = tx.prepare(
            "SELECT resource_id FROM attachments WHERE workspace_id = ?1
             GROUP BY resource_id ORDER BY MIN(rowid)",
        )?;
        let rows = stmt.query_map([workspace_id.as_str()], |row| {
            row.get::<_, String>(0).map(ResourceId::new)
        })?;
        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        resources
    };

    let attachments_deleted = tx.execute(
        "DELETE FROM attachments WHERE workspace_id = ?1",
        [workspace_id.as_str()],
    )?;
    let notes_deleted = tx.execute(
        "DELETE FROM notes WHERE workspace_id = ?1",
        [workspace_id.as_str()],
    )?;
    let workspace_deleted =
        tx.execute("DELETE FROM workspaces WHERE id = ?1", [workspace_id.as_str()])? > 0;

    tx.commit()?;

    tracing::debug!(
        workspace_id = %workspace_id,
        notes_deleted,
        attachments_deleted,
        "workspace purged"
    );

    sync_after(durability, Some(workspace_id.to_string()))?;

    Ok(PurgeReport {
        workspace_deleted,
        notes_deleted,
        attachments_deleted,
        released_resources,
    })
}

/// Deletes notes together with their attachment rows in one transaction,
/// then syncs once when a durability primitive is given.
///
/// Returns the resources the deleted notes referenced, in first-reference
/// order, as candidates for [`collect_garbage`]. Unknown ids are ignored.
pub fn delete_notes(
    db: &Database,
    workspace_id: &WorkspaceId,
    ids: &[NoteId],
    durability: Option<&dyn Durability>,
) -> Result<Vec<ResourceId>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let ledger = AttachmentLedger::new(db, workspace_id.clone());
    let notes = NoteStore::new(db, workspace_id.clone());
    let tx = db.connection().unchecked_transaction()?;

    let mut released = Vec::new();
    for id in ids {
        for resource in ledger.get(id)? {
            if !released.contains(&resource) {
                released.push(resource);
            }
        }
    }
    ledger.delete_targets(ids)?;
    notes.delete(ids)?;

    tx.commit()?;

    tracing::debug!(
        workspace_id = %workspace_id,
        requested = ids.len(),
        released = released.len(),
        "notes deleted with their attachments"
    );

    sync_after(durability, None)?;
    Ok(released)
}

fn sync_after(durability: Option<&dyn Durability>, committed: Option<String>) -> Result<()> {
    let Some(durability) = durability else {
        return Ok(());
    };
    durability.sync().map_err(|source| {
        tracing::warn!(error = %source, committed = ?committed, "durability sync failed after cleanup");
        Error::DurabilitySync { committed, source }
    })
}

/// Deletes the candidate resource files that no note references.
///
/// Referenced candidates are never passed to the file store. Returns the
/// ids that were deleted, in candidate order without duplicates.
pub fn collect_garbage<L, F>(
    ledger: &L,
    files: &F,
    candidates: &[ResourceId],
) -> Result<Vec<ResourceId>>
where
    L: AttachmentRepository + ?Sized,
    F: ResourceFileStore + ?Sized,
{
    let mut seen = BTreeSet::new();
    let unique: Vec<ResourceId> = candidates
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();

    let orphans = ledger.find_orphaned_resources(&unique)?;
    if orphans.is_empty() {
        return Ok(orphans);
    }

    files.delete(&orphans).map_err(Error::FileStore)?;
    tracing::debug!(deleted = orphans.len(), candidates = unique.len(), "orphaned resources deleted");
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::sync::FnDurability;
    use crate::{NewWorkspace, NoteContent, WorkspaceRepository, WorkspaceStore};

    #[derive(Default)]
    struct RecordingFiles {
        deleted: RefCell<Vec<ResourceId>>,
    }

    impl ResourceFileStore for RecordingFiles {
        fn delete(&self, resources: &[ResourceId]) -> anyhow::Result<()> {
            self.deleted.borrow_mut().extend_from_slice(resources);
            Ok(())
        }
    }

    fn ids(raw: &[&str]) -> Vec<ResourceId> {
        raw.iter().copied().map(ResourceId::from).collect()
    }

    #[test]
    fn purge_removes_workspace_notes_and_attachments() {
        let db = Database::in_memory().unwrap();
        let workspaces = WorkspaceStore::new(&db);
        let doomed = workspaces.create(NewWorkspace::new("doomed")).unwrap();
        let kept = workspaces.create(NewWorkspace::new("kept")).unwrap();

        let doomed_notes = NoteStore::new(&db, doomed.clone());
        let note = doomed_notes.add(NoteContent::new("t", "b")).unwrap();
        doomed_notes.add(NoteContent::new("t2", "b2")).unwrap();
        AttachmentLedger::new(&db, doomed.clone())
            .set(&note, &ids(&["img", "pdf"]))
            .unwrap();

        let kept_notes = NoteStore::new(&db, kept.clone());
        let kept_note = kept_notes.add(NoteContent::new("k", "k")).unwrap();
        let kept_ledger = AttachmentLedger::new(&db, kept.clone());
        kept_ledger.set(&kept_note, &ids(&["img"])).unwrap();

        let syncs = Cell::new(0);
        let durability = FnDurability::new(|| {
            syncs.set(syncs.get() + 1);
            Ok(())
        });
        let report = purge_workspace(&db, &doomed, Some(&durability)).unwrap();

        assert_eq!(
            report,
            PurgeReport {
                workspace_deleted: true,
                notes_deleted: 2,
                attachments_deleted: 2,
                released_resources: ids(&["img", "pdf"]),
            }
        );
        assert_eq!(syncs.get(), 1);
        assert_eq!(workspaces.get(&doomed).unwrap(), None);
        assert_eq!(doomed_notes.get_length().unwrap(), 0);
        assert_eq!(kept_notes.get_length().unwrap(), 1);
        assert_eq!(kept_ledger.get(&kept_note).unwrap(), ids(&["img"]));
    }

    #[test]
    fn purge_of_unknown_workspace_reports_nothing_deleted() {
        let db = Database::in_memory().unwrap();

        let report = purge_workspace(&db, &WorkspaceId::new("missing"), None).unwrap();

        assert_eq!(report, PurgeReport::default());
    }

    #[test]
    fn deleting_notes_drops_their_attachment_rows() {
        let db = Database::in_memory().unwrap();
        let workspace = WorkspaceId::new("ws");
        let notes = NoteStore::new(&db, workspace.clone());
        let ledger = AttachmentLedger::new(&db, workspace.clone());
        let doomed = notes.add(NoteContent::new("doomed", "")).unwrap();
        let kept = notes.add(NoteContent::new("kept", "")).unwrap();
        ledger.set(&doomed, &ids(&["img", "pdf"])).unwrap();
        ledger.set(&kept, &ids(&["pdf"])).unwrap();
        let syncs = Cell::new(0);
        let durability = FnDurability::new(|| {
            syncs.set(syncs.get() + 1);
            Ok(())
        });

        let released = delete_notes(&db, &workspace, &[doomed.clone()], Some(&durability)).unwrap();

        assert_eq!(released, ids(&["img", "pdf"]));
        assert_eq!(syncs.get(), 1);
        assert_eq!(notes.get_by_id(&doomed).unwrap(), None);
        assert!(ledger.get(&doomed).unwrap().is_empty());
        assert_eq!(ledger.get(&kept).unwrap(), ids(&["pdf"]));
        assert_eq!(
            ledger.find_orphaned_resources(&released).unwrap(),
            ids(&["img"])
        );
    }

    #[test]
    fn deleting_no_notes_skips_sync() {
        let db = Database::in_memory().unwrap();
        let durability = FnDurability::new(|| anyhow::bail!("must not be called"));

        let released = delete_notes(&db, &WorkspaceId::new("ws"), &[], Some(&durability)).unwrap();

        assert!(released.is_empty());
    }

    #[test]
    fn collect_garbage_deletes_only_orphans() {
        let db = Database::in_memory().unwrap();
        let ledger = AttachmentLedger::new(&db, WorkspaceId::new("ws"));
        ledger.set(&NoteId::new("note"), &ids(&["a"])).unwrap();
        let files = RecordingFiles::default();

        let deleted = collect_garbage(&ledger, &files, &ids(&["a", "b", "c", "b"])).unwrap();

        assert_eq!(deleted, ids(&["b", "c"]));
        assert_eq!(*files.deleted.borrow(), ids(&["b", "c"]));
    }

    #[test]
    fn collect_garbage_skips_file_store_when_everything_is_referenced() {
        let db = Database::in_memory().unwrap();
        let ledger = AttachmentLedger::new(&db, WorkspaceId::new("ws"));
        ledger.set(&NoteId::new("note"), &ids(&["a", "b"])).unwrap();

        struct FailingFiles;
        impl ResourceFileStore for FailingFiles {
            fn delete(&self, _: &[ResourceId]) -> anyhow::Result<()> {
                anyhow::bail!("must not be called")
            }
        }

        let deleted = collect_garbage(&ledger, &FailingFiles, &ids(&["a", "b"])).unwrap();

        assert!(deleted.is_empty());
    }

    #[test]
    fn file_store_failure_is_surfaced() {
        let db = Database::in_memory().unwrap();
        let ledger = AttachmentLedger::new(&db, WorkspaceId::new("ws"));

        struct FailingFiles;
        impl ResourceFileStore for FailingFiles {
            fn delete(&self, _: &[ResourceId]) -> anyhow::Result<()> {
                anyhow::bail!("disk unavailable")
            }
        }

        let result = collect_garbage(&ledger, &FailingFiles, &ids(&["gone"]));

        assert!(matches!(result, Err(Error::FileStore(_))));
    }
}
