//! Attachment reference tracking.
//!
//! Records which notes of a workspace reference which resource files, so a
//! garbage-collection pass can tell which files are safe to delete.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::{self, Database};
use crate::{AttachmentRef, NoteId, ResourceId, Result, WorkspaceId};

/// Attachment operations, implemented by [`AttachmentLedger`] and by
/// decorators wrapping it.
pub trait AttachmentRepository {
    /// Replaces the full attachment set of `target`.
    fn set(&self, target: &NoteId, resources: &[ResourceId]) -> Result<()>;

    /// Resources referenced by `target`, in the order they were set.
    fn get(&self, target: &NoteId) -> Result<Vec<ResourceId>>;

    /// Removes every reference to the given resources, across all notes.
    fn delete(&self, resources: &[ResourceId]) -> Result<()>;

    /// Returns the subset of `resources` that no note references.
    fn find_orphaned_resources(&self, resources: &[ResourceId]) -> Result<Vec<ResourceId>>;
}

/// Reference rows of one workspace.
pub struct AttachmentLedger<'db> {
    db: &'db Database,
    workspace_id: WorkspaceId,
}

impl<'db> AttachmentLedger<'db> {
    pub fn new(db: &'db Database, workspace_id: WorkspaceId) -> Self {
        Self { db, workspace_id }
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// Full reference rows of `target`, in insertion order.
    pub fn references(&self, target: &NoteId) -> Result<Vec<AttachmentRef>> {
        let mut stmt = self.db.connection().prepare(
            "SELECT id, resource_id FROM attachments
             WHERE workspace_id = ?1 AND note_id = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map((self.workspace_id.as_str(), target.as_str()), |row| {
            Ok(AttachmentRef {
                id: row.get(0)?,
                workspace_id: self.workspace_id.clone(),
                note_id: target.clone(),
                resource_id: ResourceId::new(row.get::<_, String>(1)?),
            })
        })?;

        let mut refs = Vec::new();
        for row in rows {
            refs.push(row?);
        }
        Ok(refs)
    }

    /// Notes that reference `resource`, in insertion order of their rows.
    pub fn get_targets(&self, resource: &ResourceId) -> Result<Vec<NoteId>> {
        let mut stmt = self.db.connection().prepare(
            "SELECT note_id FROM attachments
             WHERE workspace_id = ?1 AND resource_id = ?2
             GROUP BY note_id ORDER BY MIN(rowid)",
        )?;
        let rows = stmt.query_map((self.workspace_id.as_str(), resource.as_str()), |row| {
            row.get::<_, String>(0).map(NoteId::new)
        })?;

        let mut targets = Vec::new();
        for row in rows {
            targets.push(row?);
        }
        Ok(targets)
    }

    /// Drops every reference row owned by the given notes.
    pub fn delete_targets(&self, targets: &[NoteId]) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let deleted = self.db.connection().execute(
            "DELETE FROM attachments WHERE workspace_id = ?1 AND note_id IN rarray(?2)",
            (
                self.workspace_id.as_str(),
                db::id_array(targets.iter().map(NoteId::as_str)),
            ),
        )?;

        tracing::debug!(workspace_id = %self.workspace_id, deleted, "attachment rows of notes deleted");
        Ok(())
    }
}

impl AttachmentRepository for AttachmentLedger<'_> {
    fn set(&self, target: &NoteId, resources: &[ResourceId]) -> Result<()> {
        let tx = self.db.connection().unchecked_transaction()?;

        tx.execute(
            "DELETE FROM attachments WHERE workspace_id = ?1 AND note_id = ?2",
            (self.workspace_id.as_str(), target.as_str()),
        )?;

        if !resources.is_empty() {
            let mut insert = tx.prepare_cached(
                "INSERT INTO attachments (id, workspace_id, note_id, resource_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for resource in resources {
                insert.execute((
                    Uuid::new_v4().to_string(),
                    self.workspace_id.as_str(),
                    target.as_str(),
                    resource.as_str(),
                ))?;
            }
        }

        tx.commit()?;

        tracing::debug!(
            workspace_id = %self.workspace_id,
            note_id = %target,
            count = resources.len(),
            "attachments set"
        );
        Ok(())
    }

    fn get(&self, target: &NoteId) -> Result<Vec<ResourceId>> {
        let mut stmt = self.db.connection().prepare(
            "SELECT resource_id FROM attachments
             WHERE workspace_id = ?1 AND note_id = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map((self.workspace_id.as_str(), target.as_str()), |row| {
            row.get::<_, String>(0).map(ResourceId::new)
        })?;

        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        Ok(resources)
    }

    fn delete(&self, resources: &[ResourceId]) -> Result<()> {
        if resources.is_empty() {
            return Ok(());
        }

        let deleted = self.db.connection().execute(
            "DELETE FROM attachments WHERE workspace_id = ?1 AND resource_id IN rarray(?2)",
            (
                self.workspace_id.as_str(),
                db::id_array(resources.iter().map(ResourceId::as_str)),
            ),
        )?;

        tracing::debug!(workspace_id = %self.workspace_id, deleted, "attachment rows deleted");
        Ok(())
    }

    fn find_orphaned_resources(&self, resources: &[ResourceId]) -> Result<Vec<ResourceId>> {
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.db.connection().prepare(
            "SELECT DISTINCT resource_id FROM attachments
             WHERE workspace_id = ?1 AND resource_id IN rarray(?2)",
        )?;
        let rows = stmt.query_map(
            (
                self.workspace_id.as_str(),
                db::id_array(resources.iter().map(ResourceId::as_str)),
            ),
            |row| row.get::<_, String>(0),
        )?;

        let mut referenced = HashSet::new();
        for row in rows {
            referenced.insert(row?);
        }

        Ok(resources
            .iter()
            .filter(|resource| !referenced.contains(resource.as_str()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ResourceId> {
        raw.iter().copied().map(ResourceId::from).collect()
    }

    fn ledger(db: &Database) -> AttachmentLedger<'_> {
        AttachmentLedger::new(db, WorkspaceId::new("ws"))
    }

    #[test]
    fn set_then_get_preserves_order() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let note = NoteId::new("note");

        ledger.set(&note, &ids(&["c", "a", "b"])).unwrap();

        assert_eq!(ledger.get(&note).unwrap(), ids(&["c", "a", "b"]));
    }

    #[test]
    fn set_replaces_previous_set() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let note = NoteId::new("note");

        ledger.set(&note, &ids(&["a", "b", "c"])).unwrap();
        ledger.set(&note, &ids(&["d"])).unwrap();

        assert_eq!(ledger.get(&note).unwrap(), ids(&["d"]));
    }

    #[test]
    fn set_with_empty_list_clears_note() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let note = NoteId::new("note");

        ledger.set(&note, &ids(&["a", "b"])).unwrap();
        ledger.set(&note, &[]).unwrap();

        assert!(ledger.get(&note).unwrap().is_empty());
    }

    #[test]
    fn set_keeps_other_notes_untouched() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let first = NoteId::new("first");
        let second = NoteId::new("second");

        ledger.set(&first, &ids(&["a"])).unwrap();
        ledger.set(&second, &ids(&["a", "b"])).unwrap();
        ledger.set(&first, &[]).unwrap();

        assert_eq!(ledger.get(&second).unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn failed_set_leaves_previous_set_intact() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let note = NoteId::new("note");
        ledger.set(&note, &ids(&["a", "b"])).unwrap();

        // Make every insert fail after the delete has already run.
        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_inserts BEFORE INSERT ON attachments
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(ledger.set(&note, &ids(&["c"])).is_err());
        assert_eq!(ledger.get(&note).unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn delete_removes_resource_across_notes() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let first = NoteId::new("first");
        let second = NoteId::new("second");

        ledger.set(&first, &ids(&["a", "b"])).unwrap();
        ledger.set(&second, &ids(&["b", "c"])).unwrap();
        ledger.delete(&ids(&["b"])).unwrap();

        assert_eq!(ledger.get(&first).unwrap(), ids(&["a"]));
        assert_eq!(ledger.get(&second).unwrap(), ids(&["c"]));
    }

    #[test]
    fn find_orphaned_resources_reports_only_unreferenced() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);

        ledger.set(&NoteId::new("note"), &ids(&["a"])).unwrap();

        assert_eq!(
            ledger.find_orphaned_resources(&ids(&["a", "b", "c"])).unwrap(),
            ids(&["b", "c"])
        );
        assert!(ledger.find_orphaned_resources(&[]).unwrap().is_empty());
    }

    #[test]
    fn shared_resource_stays_referenced_until_last_note_drops_it() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let first = NoteId::new("first");
        let second = NoteId::new("second");

        ledger.set(&first, &ids(&["shared"])).unwrap();
        ledger.set(&second, &ids(&["shared"])).unwrap();

        ledger.set(&first, &[]).unwrap();
        assert!(ledger.find_orphaned_resources(&ids(&["shared"])).unwrap().is_empty());

        ledger.set(&second, &[]).unwrap();
        assert_eq!(
            ledger.find_orphaned_resources(&ids(&["shared"])).unwrap(),
            ids(&["shared"])
        );
    }

    #[test]
    fn orphan_detection_is_scoped_to_workspace() {
        let db = Database::in_memory().unwrap();
        let ours = ledger(&db);
        let theirs = AttachmentLedger::new(&db, WorkspaceId::new("other"));

        theirs.set(&NoteId::new("note"), &ids(&["a"])).unwrap();

        assert_eq!(ours.find_orphaned_resources(&ids(&["a"])).unwrap(), ids(&["a"]));
        assert!(theirs.find_orphaned_resources(&ids(&["a"])).unwrap().is_empty());
    }

    #[test]
    fn targets_and_references_describe_rows() {
        let db = Database::in_memory().unwrap();
        let ledger = ledger(&db);
        let first = NoteId::new("first");
        let second = NoteId::new("second");

        ledger.set(&first, &ids(&["a", "b"])).unwrap();
        ledger.set(&second, &ids(&["a"])).unwrap();

        assert_eq!(
            ledger.get_targets(&ResourceId::new("a")).unwrap(),
            vec![first.clone(), second.clone()]
        );

        let refs = ledger.references(&first).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].resource_id, ResourceId::new("b"));
        assert_ne!(refs[0].id, refs[1].id);

        ledger.delete_targets(&[first.clone()]).unwrap();
        assert!(ledger.get(&first).unwrap().is_empty());
        assert_eq!(ledger.get(&second).unwrap(), ids(&["a"]));
    }
}
