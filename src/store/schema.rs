//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use super::StoreError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(ITEMS_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Items table. Timestamps are fixed-width RFC 3339 (UTC, microseconds) so
/// that text ordering matches time ordering.
const ITEMS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content_items (
    content_hash TEXT NOT NULL,
    source TEXT NOT NULL,
    platform TEXT NOT NULL,
    feed_type TEXT NOT NULL,

    -- Lifecycle
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'published', 'skipped')),
    ingested_at TEXT NOT NULL,
    published_at TEXT,
    skipped_at TEXT,
    skip_reason TEXT,

    -- Upstream change detection
    item_published_at TEXT,
    item_modified_at TEXT,

    -- JSON documents
    metadata TEXT NOT NULL,
    full_content TEXT NOT NULL,
    processed_data TEXT,

    PRIMARY KEY (content_hash, source)
);

CREATE INDEX IF NOT EXISTS idx_items_triple
    ON content_items (source, platform, feed_type);
CREATE INDEX IF NOT EXISTS idx_items_pending
    ON content_items (source, feed_type, status, ingested_at);
CREATE INDEX IF NOT EXISTS idx_items_published
    ON content_items (source, feed_type, status, item_published_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_unreadable_version_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version TEXT NOT NULL);
             INSERT INTO schema_version (version) VALUES ('abc');",
        )
        .unwrap();

        assert!(matches!(get_schema_version(&conn), Err(StoreError::Database(_))));
    }
}
