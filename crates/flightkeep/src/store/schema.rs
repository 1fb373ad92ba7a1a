//! `SQLite` schema definitions for the flightkeep store.

/// Bookkeeping table. Created before anything else so the schema version can
/// be read from any database.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// One row per store key. `rowid` gives first-write enumeration order.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
";

/// Statements for each schema version, oldest first. Entry `n` upgrades a
/// database from version `n` to `n + 1`.
pub const MIGRATIONS: &[&[&str]] = &[&[CREATE_ENTRIES_TABLE]];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_migration_has_statements() {
        assert!(!MIGRATIONS.is_empty());
        assert!(MIGRATIONS.iter().all(|step| !step.is_empty()));
    }

    #[test]
    fn test_entries_table_columns() {
        assert!(CREATE_ENTRIES_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_ENTRIES_TABLE.contains("value TEXT NOT NULL"));
        assert!(CREATE_ENTRIES_TABLE.contains("updated_at"));
    }
}
