use rusqlite::{OptionalExtension, Row};

use crate::db::{self, Database};
use crate::{Error, NewWorkspace, Result, Workspace, WorkspaceId, WorkspacePatch};

/// Workspace operations, implemented by [`WorkspaceStore`] and by decorators
/// wrapping it.
pub trait WorkspaceRepository {
    fn create(&self, workspace: NewWorkspace) -> Result<WorkspaceId>;

    fn get(&self, id: &WorkspaceId) -> Result<Option<Workspace>>;

    /// All workspaces of the profile, in creation order.
    fn get_list(&self) -> Result<Vec<Workspace>>;

    /// Fails with [`Error::NotFound`] when `id` does not exist.
    fn update(&self, id: &WorkspaceId, patch: WorkspacePatch) -> Result<()>;

    /// Deletes workspace rows only. Their notes and attachments are left in
    /// place; see [`crate::cleanup::purge_workspace`] for the cascading form.
    fn delete(&self, ids: &[WorkspaceId]) -> Result<()>;
}

/// Workspaces of the profile that owns the database.
pub struct WorkspaceStore<'db> {
    db: &'db Database,
}

impl<'db> WorkspaceStore<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl WorkspaceRepository for WorkspaceStore<'_> {
    fn create(&self, workspace: NewWorkspace) -> Result<WorkspaceId> {
        let id = WorkspaceId::generate();

        self.db.connection().execute(
            "INSERT INTO workspaces (id, name, created_at) VALUES (?1, ?2, ?3)",
            (id.as_str(), &workspace.name, db::now_millis()),
        )?;

        tracing::debug!(workspace_id = %id, name = %workspace.name, "workspace created");
        Ok(id)
    }

    fn get(&self, id: &WorkspaceId) -> Result<Option<Workspace>> {
        let workspace = self
            .db
            .connection()
            .query_row(
                "SELECT id, name, created_at FROM workspaces WHERE id = ?1",
                [id.as_str()],
                workspace_from_row,
            )
            .optional()?;
        Ok(workspace)
    }

    fn get_list(&self) -> Result<Vec<Workspace>> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT id, name, created_at FROM workspaces ORDER BY rowid")?;
        let rows = stmt.query_map([], workspace_from_row)?;

        let mut workspaces = Vec::new();
        for row in rows {
            workspaces.push(row?);
        }
        Ok(workspaces)
    }

    fn update(&self, id: &WorkspaceId, patch: WorkspacePatch) -> Result<()> {
        let conn = self.db.connection();

        let changed = match patch.name {
            Some(name) => conn.execute(
                "UPDATE workspaces SET name = ?1 WHERE id = ?2",
                (&name, id.as_str()),
            )?,
            // Nothing to write, but a missing workspace is still reported.
            None => conn.query_row(
                "SELECT COUNT(*) FROM workspaces WHERE id = ?1",
                [id.as_str()],
                |row| row.get::<_, i64>(0),
            )? as usize,
        };

        if changed == 0 {
            return Err(Error::not_found("workspace", id));
        }

        tracing::debug!(workspace_id = %id, "workspace updated");
        Ok(())
    }

    fn delete(&self, ids: &[WorkspaceId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let deleted = self.db.connection().execute(
            "DELETE FROM workspaces WHERE id IN rarray(?1)",
            [db::id_array(ids.iter().map(WorkspaceId::as_str))],
        )?;

        tracing::debug!(requested = ids.len(), deleted, "workspaces deleted");
        Ok(())
    }
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: WorkspaceId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        created_at: db::datetime_column(row, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoteContent, NoteRepository, NoteStore};

    #[test]
    fn create_and_get_roundtrip() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);

        let id = store.create(NewWorkspace::new("test")).unwrap();
        let workspace = store.get(&id).unwrap().expect("workspace should exist");

        assert_eq!(workspace.id, id);
        assert_eq!(workspace.name, "test");
    }

    #[test]
    fn get_missing_returns_none() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);

        assert_eq!(store.get(&WorkspaceId::new("missing")).unwrap(), None);
    }

    #[test]
    fn list_is_in_creation_order() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);

        let names = ["Personal", "Work", "Archive"];
        for name in names {
            store.create(NewWorkspace::new(name)).unwrap();
        }

        let listed: Vec<String> = store
            .get_list()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn update_renames() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);
        let id = store.create(NewWorkspace::new("old")).unwrap();

        store.update(&id, WorkspacePatch::rename("new")).unwrap();

        assert_eq!(store.get(&id).unwrap().unwrap().name, "new");
    }

    #[test]
    fn update_missing_is_not_found_with_or_without_fields() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);
        let missing = WorkspaceId::new("missing");

        assert!(matches!(
            store.update(&missing, WorkspacePatch::rename("x")),
            Err(Error::NotFound { entity: "workspace", .. })
        ));
        assert!(matches!(
            store.update(&missing, WorkspacePatch::default()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn empty_patch_on_existing_workspace_is_a_no_op() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);
        let id = store.create(NewWorkspace::new("keep")).unwrap();

        store.update(&id, WorkspacePatch::default()).unwrap();

        assert_eq!(store.get(&id).unwrap().unwrap().name, "keep");
    }

    #[test]
    fn delete_does_not_cascade_to_notes() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);
        let id = store.create(NewWorkspace::new("doomed")).unwrap();
        let notes = NoteStore::new(&db, id.clone());
        notes.add(NoteContent::new("t", "b")).unwrap();

        store.delete(&[id.clone()]).unwrap();

        assert_eq!(store.get(&id).unwrap(), None);
        assert_eq!(notes.get_length().unwrap(), 1);
    }

    #[test]
    fn delete_ignores_unknown_ids() {
        let db = Database::in_memory().unwrap();
        let store = WorkspaceStore::new(&db);
        let kept = store.create(NewWorkspace::new("kept")).unwrap();

        store.delete(&[WorkspaceId::new("missing")]).unwrap();
        store.delete(&[]).unwrap();

        assert_eq!(store.get_list().unwrap().len(), 1);
        assert!(store.get(&kept).unwrap().is_some());
    }
}
