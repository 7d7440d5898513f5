use rusqlite::{OptionalExtension, Row};

use crate::db::{self, Database};
use crate::{Error, Note, NoteBuilder, NoteContent, NoteContentPatch, NoteId, Result, WorkspaceId};

/// Note operations, implemented by [`NoteStore`] and by decorators wrapping it.
pub trait NoteRepository {
    /// Inserts a note and returns its new id.
    fn add(&self, content: NoteContent) -> Result<NoteId>;

    /// Merges `patch` onto an existing note and advances its `updated_at`.
    ///
    /// Fails with [`Error::NotFound`] when `id` is not in the workspace.
    fn update(&self, id: &NoteId, patch: NoteContentPatch) -> Result<()>;

    /// Lists notes, optionally paginated.
    fn get(&self, query: NoteQuery) -> Result<Vec<Note>>;

    /// Resolves the given ids. Unknown ids are omitted from the result.
    fn get_by_ids(&self, ids: &[NoteId]) -> Result<Vec<Note>>;

    /// Total number of notes in the workspace.
    fn get_length(&self) -> Result<u64>;

    /// Deletes the given notes. Unknown ids are ignored.
    fn delete(&self, ids: &[NoteId]) -> Result<()>;

    fn get_by_id(&self, id: &NoteId) -> Result<Option<Note>> {
        Ok(self
            .get_by_ids(std::slice::from_ref(id))?
            .into_iter()
            .next())
    }
}

/// Ordering for note listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOrder {
    /// Oldest insert first.
    #[default]
    Inserted,
    /// Most recently updated first; ties fall back to newest insert first.
    Updated,
}

impl NoteOrder {
    fn order_clause(self) -> &'static str {
        match self {
            NoteOrder::Inserted => "rowid ASC",
            NoteOrder::Updated => "updated_at DESC, rowid DESC",
        }
    }
}

/// Pagination and ordering for [`NoteRepository::get`].
///
/// `page` is 1-indexed and requires a `limit`. Both are validated before
/// any query runs.
///
/// # Examples
///
/// ```
/// use inkvault::NoteQuery;
///
/// let all = NoteQuery::default();
/// assert_eq!(all.limit, None);
///
/// let second_page = NoteQuery::page(2, 100);
/// assert_eq!(second_page.offset().unwrap(), Some(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoteQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order: NoteOrder,
}

impl NoteQuery {
    /// Page `page` of `limit` notes each.
    pub fn page(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// The first `limit` notes.
    pub fn limit(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn ordered_by(mut self, order: NoteOrder) -> Self {
        self.order = order;
        self
    }

    /// Validates the query and returns the row offset it addresses.
    ///
    /// Returns `Ok(None)` when no page was requested.
    pub fn offset(&self) -> Result<Option<i64>> {
        if let Some(limit) = self.limit
            && limit < 1
        {
            return Err(Error::InvalidArgument(format!(
                "limit must be positive, got {limit}"
            )));
        }

        let Some(page) = self.page else {
            return Ok(None);
        };
        if page < 1 {
            return Err(Error::InvalidArgument(format!(
                "page must be 1 or greater, got {page}"
            )));
        }
        let Some(limit) = self.limit else {
            return Err(Error::InvalidArgument(
                "page requires a limit".to_string(),
            ));
        };

        (page - 1)
            .checked_mul(limit)
            .map(Some)
            .ok_or_else(|| Error::InvalidArgument(format!("page {page} is out of range")))
    }
}

const NOTE_COLUMNS: &str = "id, workspace_id, title, text, created_at, updated_at";

/// Notes of one workspace, stored in the profile database.
pub struct NoteStore<'db> {
    db: &'db Database,
    workspace_id: WorkspaceId,
}

impl<'db> NoteStore<'db> {
    pub fn new(db: &'db Database, workspace_id: WorkspaceId) -> Self {
        Self { db, workspace_id }
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }
}

impl NoteRepository for NoteStore<'_> {
    fn add(&self, content: NoteContent) -> Result<NoteId> {
        let id = NoteId::generate();
        let now = db::now_millis();

        self.db.connection().execute(
            "INSERT INTO notes (id, workspace_id, title, text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            (
                id.as_str(),
                self.workspace_id.as_str(),
                &content.title,
                &content.text,
                now,
            ),
        )?;

        tracing::debug!(workspace_id = %self.workspace_id, note_id = %id, "note added");
        Ok(id)
    }

    fn update(&self, id: &NoteId, patch: NoteContentPatch) -> Result<()> {
        let tx = self.db.connection().unchecked_transaction()?;

        let current = tx
            .query_row(
                "SELECT title, text, updated_at FROM notes WHERE workspace_id = ?1 AND id = ?2",
                (self.workspace_id.as_str(), id.as_str()),
                |row| {
                    Ok((
                        NoteContent::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((mut content, previous_updated)) = current else {
            return Err(Error::not_found("note", id));
        };

        patch.apply_to(&mut content);
        // Strictly advance, even when the clock hasn't moved since the last write.
        let updated = db::now_millis().max(previous_updated + 1);

        tx.execute(
            "UPDATE notes SET title = ?1, text = ?2, updated_at = ?3
             WHERE workspace_id = ?4 AND id = ?5",
            (
                &content.title,
                &content.text,
                updated,
                self.workspace_id.as_str(),
                id.as_str(),
            ),
        )?;
        tx.commit()?;

        tracing::debug!(workspace_id = %self.workspace_id, note_id = %id, "note updated");
        Ok(())
    }

    fn get(&self, query: NoteQuery) -> Result<Vec<Note>> {
        let offset = query.offset()?.unwrap_or(0);
        // SQLite treats a negative LIMIT as "no limit".
        let limit = query.limit.unwrap_or(-1);

        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE workspace_id = ?1
             ORDER BY {} LIMIT ?2 OFFSET ?3",
            query.order.order_clause()
        );
        let mut stmt = self.db.connection().prepare(&sql)?;
        let rows = stmt.query_map((self.workspace_id.as_str(), limit, offset), note_from_row)?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }

    fn get_by_ids(&self, ids: &[NoteId]) -> Result<Vec<Note>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.db.connection().prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE workspace_id = ?1 AND id IN rarray(?2)
             ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(
            (
                self.workspace_id.as_str(),
                db::id_array(ids.iter().map(NoteId::as_str)),
            ),
            note_from_row,
        )?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }

    fn get_length(&self) -> Result<u64> {
        let count: i64 = self.db.connection().query_row(
            "SELECT COUNT(*) FROM notes WHERE workspace_id = ?1",
            [self.workspace_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete(&self, ids: &[NoteId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let deleted = self.db.connection().execute(
            "DELETE FROM notes WHERE workspace_id = ?1 AND id IN rarray(?2)",
            (
                self.workspace_id.as_str(),
                db::id_array(ids.iter().map(NoteId::as_str)),
            ),
        )?;

        tracing::debug!(workspace_id = %self.workspace_id, requested = ids.len(), deleted, "notes deleted");
        Ok(())
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(NoteBuilder::new()
        .id(NoteId::new(row.get::<_, String>(0)?))
        .workspace_id(WorkspaceId::new(row.get::<_, String>(1)?))
        .content(NoteContent::new(
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
        .created_at(db::datetime_column(row, 4)?)
        .updated_at(db::datetime_column(row, 5)?)
        .build())
}
