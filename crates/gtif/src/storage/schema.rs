//! `SQLite` schema for the registration database.

/// Registrations, one row per submitted form.
pub const CREATE_REGISTRATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS registrations (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    company TEXT NOT NULL DEFAULT '',
    industry TEXT NOT NULL,
    role TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    photo_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
)
";

/// Listing is newest first.
pub const CREATE_CREATED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_registrations_created_at ON registrations(created_at DESC)
";

/// Key-value pairs about the database itself.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_REGISTRATIONS_TABLE,
    CREATE_CREATED_AT_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrations_table_columns() {
        for column in [
            "id TEXT PRIMARY KEY",
            "full_name TEXT NOT NULL",
            "email TEXT NOT NULL",
            "industry TEXT NOT NULL",
            "role TEXT NOT NULL",
            "photo_url TEXT NOT NULL",
            "created_at TEXT NOT NULL",
        ] {
            assert!(CREATE_REGISTRATIONS_TABLE.contains(column), "missing {column}");
        }
    }

    #[test]
    fn test_statements_not_empty() {
        assert_eq!(SCHEMA_STATEMENTS.len(), 3);
        assert!(SCHEMA_STATEMENTS.iter().all(|s| !s.trim().is_empty()));
    }
}
