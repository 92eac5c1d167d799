//! Schema versioning.
//!
//! The version lives in the `metadata` table. A fresh database reports
//! version 0 and is brought forward one migration at a time.

use rusqlite::{Connection, OptionalExtension};

use super::schema::SCHEMA_STATEMENTS;
use crate::error::{Error, Result};

/// Schema version this build writes.
pub const CURRENT_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

/// Create missing tables and run pending migrations.
///
/// # Errors
///
/// Returns an error if a statement fails, or if the database was written
/// by a newer build.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    for next in version + 1..=CURRENT_VERSION {
        migrate(next)?;
        set_schema_version(conn, next)?;
    }
    Ok(())
}

/// The stored schema version, 0 when none is recorded.
///
/// # Errors
///
/// Returns an error if the query fails or the stored value is not a number.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn migrate(version: i32) -> Result<()> {
    match version {
        // Base schema, created by SCHEMA_STATEMENTS.
        1 => Ok(()),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}
