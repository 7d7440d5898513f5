use thiserror::Error;

/// Errors surfaced by the data layer.
///
/// Every failure reaches the immediate caller; nothing is swallowed inside
/// the stores.
#[derive(Debug, Error)]
pub enum Error {
    /// The record addressed by an update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Rejected before any storage access (bad page or limit).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage engine refused a write, e.g. a duplicate identifier.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[source] rusqlite::Error),

    /// The mutation committed locally but the follow-up sync failed.
    ///
    /// Retry the sync step only; re-issuing the mutation would apply it twice.
    /// `committed` carries the id a create produced, if any.
    #[error("mutation committed but durability sync failed: {source}")]
    DurabilitySync {
        committed: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    /// The external resource file store failed to delete files.
    #[error("resource file store error: {0}")]
    FileStore(#[source] anyhow::Error),

    /// Any other storage engine failure.
    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    /// The schema could not be brought up to date on open.
    #[error("migration failed: {0}")]
    Migration(#[source] anyhow::Error),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true for failures caused by the caller's input rather than
    /// the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidArgument(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::ConstraintViolation(value),
            _ => Self::Storage(value),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_failures_map_to_constraint_violation() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY)")
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES ('a')", []).unwrap();

        let err: Error = conn
            .execute("INSERT INTO t (id) VALUES ('a')", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn other_sqlite_failures_map_to_storage() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();

        let err: Error = conn
            .execute("SELECT * FROM missing_table", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = Error::not_found("note", "abc");

        assert_eq!(err.to_string(), "note not found: abc");
        assert!(err.is_user_error());
    }
}
