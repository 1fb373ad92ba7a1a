//! Schema versioning for the `SQLite` store.
//!
//! The version lives in the `metadata` table. Each pending step from
//! [`MIGRATIONS`] runs in its own transaction together with the version bump,
//! so an interrupted upgrade resumes from the last completed step.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use super::schema::{CREATE_METADATA_TABLE, MIGRATIONS};
use crate::error::{Error, Result};

/// Schema version written by this build.
pub const CURRENT_VERSION: usize = MIGRATIONS.len();

const VERSION_KEY: &str = "schema_version";

/// Bring the database up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration fails or the database was written by a
/// newer build.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let found = get_schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(migration_error(format!(
            "database schema version {found} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    for (version, statements) in MIGRATIONS.iter().enumerate().skip(found) {
        let target = version + 1;
        let tx = conn.unchecked_transaction()?;
        for statement in *statements {
            tx.execute(statement, [])?;
        }
        set_schema_version(&tx, target)?;
        tx.commit()?;
        info!(version = target, "Applied store migration");
    }

    Ok(())
}

/// Read the schema version, or 0 for a fresh database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<usize> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    stored.map_or(Ok(0), |value| {
        value
            .parse()
            .map_err(|_| migration_error(format!("invalid schema version: {value}")))
    })
}

fn set_schema_version(conn: &Connection, version: usize) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn migration_error(message: String) -> Error {
    Error::DatabaseMigration { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn has_table(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_fresh_database_is_upgraded() {
        let conn = fresh();
        initialize_schema(&conn).unwrap();

        assert!(has_table(&conn, "metadata"));
        assert!(has_table(&conn, "entries"));
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reopening_is_a_no_op() {
        let conn = fresh();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO entries (key, value) VALUES ('milavia_flights_primary', '[]')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unversioned_database_reads_as_zero() {
        let conn = fresh();
        conn.execute(CREATE_METADATA_TABLE, []).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_garbled_version_is_an_error() {
        let conn = fresh();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'v1' WHERE key = ?1",
            [VERSION_KEY],
        )
        .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version: v1"));
    }

    #[test]
    fn test_newer_database_is_refused() {
        let conn = fresh();
        initialize_schema(&conn).unwrap();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(matches!(err, Error::DatabaseMigration { .. }));
        assert!(err.to_string().contains("newer than supported"));
    }
}
