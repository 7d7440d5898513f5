//! Forward-only schema versions for the profile database.
//!
//! Applied versions are recorded in `schema_migrations`. Each step runs in
//! its own transaction together with its bookkeeping row, so a failed step
//! leaves the schema at the previous version.

use std::collections::HashSet;

use anyhow::Context;
use rusqlite::{Connection, Transaction};
use time::OffsetDateTime;

/// One schema version and the SQL that produces it.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

impl Migration {
    pub const fn new(version: u32, description: &'static str, up: &'static str) -> Self {
        Self {
            version,
            description,
            up,
        }
    }

    fn run(&self, tx: &Transaction<'_>) -> anyhow::Result<()> {
        tx.execute_batch(self.up)
            .with_context(|| format!("schema version {} ({})", self.version, self.description))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?1, ?2, ?3)",
            (
                self.version,
                OffsetDateTime::now_utc().unix_timestamp(),
                self.description,
            ),
        )?;
        Ok(())
    }
}

/// Every schema version, oldest first. Append only.
pub const MIGRATIONS: &[Migration] = &[Migration::new(
    1,
    "workspaces, notes and attachment references",
    include_str!("migrations/001_initial_schema.sql"),
)];

/// Brings the schema up to the newest version. Returns how many versions
/// were applied.
pub fn apply_pending_migrations(conn: &mut Connection) -> anyhow::Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
    )?;

    let applied = applied_versions(conn)?;
    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let tx = conn.transaction()?;
        migration.run(&tx)?;
        tx.commit()?;
        count += 1;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "schema migrated"
        );
    }
    Ok(count)
}

fn applied_versions(conn: &Connection) -> anyhow::Result<HashSet<u32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(versions)
}
