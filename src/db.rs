mod migration;

use std::path::Path;
use std::rc::Rc;

use rusqlite::types::{Type, Value};
use rusqlite::vtab::array::{self, Array};
use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{Error, Result};

pub use migration::{MIGRATIONS, Migration};

/// Handle to one profile's embedded database.
///
/// Stores borrow this handle; it is passed explicitly into every store
/// constructor rather than looked up globally.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist, switches it to WAL
    /// journaling and brings the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Self::initialize(conn)
    }

    fn initialize(mut conn: Connection) -> Result<Self> {
        // Enables `rarray(?)` for binding variable-length id lists.
        array::load_module(&conn)?;
        migration::apply_pending_migrations(&mut conn).map_err(Error::Migration)?;
        Ok(Self { conn })
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Packs ids into a single array value for `IN rarray(?)` clauses.
pub(crate) fn id_array<I, S>(ids: I) -> Array
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Rc::new(
        ids.into_iter()
            .map(|id| Value::Text(id.as_ref().to_owned()))
            .collect(),
    )
}

/// Current time truncated to whole milliseconds, the stored resolution.
pub(crate) fn now_millis() -> i64 {
    to_millis(OffsetDateTime::now_utc())
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Reads a unix-millisecond column as an `OffsetDateTime`.
pub(crate) fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let millis: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}
