//! SQLite content store.
//!
//! Owns the lifecycle of every ingested row. Rows are keyed by
//! `(content_hash, source)`; callers never write columns directly, they go
//! through the reconciliation and transition operations below.
//!
//! ## Operations
//!
//! - `find_by_key` / `insert` - ingestion lookups and first writes
//! - `update_keeping_status` / `update_and_reopen` - reconciliation updates
//! - `transition_status` - publication decisions
//! - `select_pending` / `select_published` - pipeline and feed window queries
//! - `count_by_source_triple` / `status_counts` - bookkeeping

pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{
    ContentHash, ContentItem, ItemRevision, ItemState, ItemStatus, NewItem, ProcessedData,
    Transition, TransitionError,
};

/// Errors raised by the content store. All of them are run-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {hash} in source {source_name}")]
    NotFound { hash: String, source_name: String },

    #[error("Item already exists: {hash} in source {source_name}")]
    AlreadyExists { hash: String, source_name: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

/// Per-status row counts for one (source, feed type)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub published: u64,
    pub skipped: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.published + self.skipped
    }
}

/// Current time at the precision the store persists
pub fn current_time() -> DateTime<Utc> {
    to_stored_precision(Utc::now())
}

/// Drop sub-microsecond digits, which the store does not keep
pub fn to_stored_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(6)
}

fn time_to_sql(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_time_to_sql(time: &Option<DateTime<Utc>>) -> Option<String> {
    time.as_ref().map(time_to_sql)
}

fn time_from_sql(value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| StoreError::Timestamp { value, source })
}

fn opt_time_from_sql(value: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(time_from_sql).transpose()
}

/// Parse a full row into a `ContentItem`, enforcing the status invariants
fn item_from_row(row: &Row) -> Result<ContentItem, StoreError> {
    let status: String = row.get("status")?;
    let status: ItemStatus = status.parse()?;

    let processed: Option<ProcessedData> = row
        .get::<_, Option<String>>("processed_data")?
        .map(|json| serde_json::from_str(&json))
        .transpose()?;

    let state = ItemState::from_columns(
        status,
        opt_time_from_sql(row.get("published_at")?)?,
        opt_time_from_sql(row.get("skipped_at")?)?,
        row.get("skip_reason")?,
        processed,
    )?;

    let metadata: String = row.get("metadata")?;
    let full_content: String = row.get("full_content")?;

    Ok(ContentItem {
        content_hash: ContentHash::from_hex(row.get::<_, String>("content_hash")?),
        source: row.get("source")?,
        platform: row.get("platform")?,
        feed_type: row.get("feed_type")?,
        state,
        ingested_at: time_from_sql(row.get("ingested_at")?)?,
        item_published_at: opt_time_from_sql(row.get("item_published_at")?)?,
        item_modified_at: opt_time_from_sql(row.get("item_modified_at")?)?,
        metadata: serde_json::from_str(&metadata)?,
        full_content: serde_json::from_str(&full_content)?,
    })
}

fn collect_items(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ContentItem>, StoreError> {
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(item_from_row(row)?);
    }
    Ok(items)
}

/// Durable table of ingested items
pub struct ContentStore {
    conn: Mutex<Connection>,
}

impl ContentStore {
    /// Open or create the store at the given database path
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        info!("Opening content store at {:?}", db_path);

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory content store");
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&mut conn)
    }

    /// Look up a row by its unique key
    pub fn find_by_key(&self, hash: &ContentHash, source: &str) -> Result<Option<ContentItem>, StoreError> {
        self.with_conn(|conn| find_in(conn, hash, source))
    }

    /// Insert a new pending row
    pub fn insert(&self, item: &NewItem) -> Result<(), StoreError> {
        let revision = &item.revision;
        let metadata = serde_json::to_string(&revision.metadata)?;
        let full_content = serde_json::to_string(&revision.full_content)?;

        self.with_conn(|conn| {
            let result = conn.execute(
                r#"
                INSERT INTO content_items (
                    content_hash, source, platform, feed_type, status, ingested_at,
                    item_published_at, item_modified_at, metadata, full_content
                ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    item.content_hash.as_str(),
                    item.source,
                    item.platform,
                    item.feed_type,
                    time_to_sql(&item.ingested_at),
                    opt_time_to_sql(&revision.item_published_at),
                    opt_time_to_sql(&revision.item_modified_at),
                    metadata,
                    full_content,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::AlreadyExists {
                        hash: item.content_hash.to_string(),
                        source_name: item.source.clone(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Rewrite the upstream-owned fields, leaving the lifecycle untouched
    pub fn update_keeping_status(
        &self,
        hash: &ContentHash,
        source: &str,
        revision: &ItemRevision,
    ) -> Result<(), StoreError> {
        self.update_revision(hash, source, revision, false)
    }

    /// Rewrite the upstream-owned fields and reset the row to pending,
    /// clearing any previous decision
    pub fn update_and_reopen(
        &self,
        hash: &ContentHash,
        source: &str,
        revision: &ItemRevision,
    ) -> Result<(), StoreError> {
        self.update_revision(hash, source, revision, true)
    }

    fn update_revision(
        &self,
        hash: &ContentHash,
        source: &str,
        revision: &ItemRevision,
        reopen: bool,
    ) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&revision.metadata)?;
        let full_content = serde_json::to_string(&revision.full_content)?;

        let sql = if reopen {
            r#"
            UPDATE content_items SET
                item_published_at = ?3, item_modified_at = ?4, metadata = ?5, full_content = ?6,
                status = 'pending', published_at = NULL, skipped_at = NULL,
                skip_reason = NULL, processed_data = NULL
            WHERE content_hash = ?1 AND source = ?2
            "#
        } else {
            r#"
            UPDATE content_items SET
                item_published_at = ?3, item_modified_at = ?4, metadata = ?5, full_content = ?6
            WHERE content_hash = ?1 AND source = ?2
            "#
        };

        self.with_conn(|conn| {
            let changed = conn.execute(
                sql,
                params![
                    hash.as_str(),
                    source,
                    opt_time_to_sql(&revision.item_published_at),
                    opt_time_to_sql(&revision.item_modified_at),
                    metadata,
                    full_content,
                ],
            )?;

            if changed == 0 {
                return Err(StoreError::NotFound {
                    hash: hash.to_string(),
                    source_name: source.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Decide a pending row. Fails with a transition error if the row has
    /// already been decided.
    pub fn transition_status(
        &self,
        hash: &ContentHash,
        source: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<ItemState, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let current = find_in(&tx, hash, source)?.ok_or_else(|| StoreError::NotFound {
                hash: hash.to_string(),
                source_name: source.to_string(),
            })?;

            let next = current.state.apply(transition, at)?;

            match &next {
                ItemState::Published {
                    published_at,
                    processed,
                } => {
                    tx.execute(
                        r#"
                        UPDATE content_items SET
                            status = 'published', published_at = ?3, processed_data = ?4,
                            skipped_at = NULL, skip_reason = NULL
                        WHERE content_hash = ?1 AND source = ?2
                        "#,
                        params![
                            hash.as_str(),
                            source,
                            time_to_sql(published_at),
                            serde_json::to_string(processed)?,
                        ],
                    )?;
                }
                ItemState::Skipped { skipped_at, reason } => {
                    tx.execute(
                        r#"
                        UPDATE content_items SET
                            status = 'skipped', skipped_at = ?3, skip_reason = ?4,
                            published_at = NULL, processed_data = NULL
                        WHERE content_hash = ?1 AND source = ?2
                        "#,
                        params![hash.as_str(), source, time_to_sql(skipped_at), reason.to_string()],
                    )?;
                }
                ItemState::Pending => {}
            }

            tx.commit()?;
            Ok(next)
        })
    }

    /// Oldest-ingested pending rows first
    pub fn select_pending(
        &self,
        source: &str,
        feed_type: &str,
        limit: usize,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM content_items
                WHERE source = ?1 AND feed_type = ?2 AND status = 'pending'
                ORDER BY ingested_at ASC, rowid ASC
                LIMIT ?3
                "#,
            )?;
            collect_items(&mut stmt, &[&source, &feed_type, &(limit as i64)])
        })
    }

    /// Freshest published rows first, leaving out the given hashes
    pub fn select_published(
        &self,
        source: &str,
        feed_type: &str,
        limit: usize,
        exclude: &[ContentHash],
    ) -> Result<Vec<ContentItem>, StoreError> {
        let mut sql = String::from(
            "SELECT * FROM content_items WHERE source = ? AND feed_type = ? AND status = 'published'",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(source.to_string()), Box::new(feed_type.to_string())];

        if !exclude.is_empty() {
            let placeholders: Vec<_> = exclude.iter().map(|_| "?").collect();
            sql.push_str(&format!(" AND content_hash NOT IN ({})", placeholders.join(", ")));
            for hash in exclude {
                params.push(Box::new(hash.as_str().to_string()));
            }
        }

        // NULL publish dates sort last under DESC
        sql.push_str(" ORDER BY item_published_at DESC, rowid DESC LIMIT ?");
        params.push(Box::new(limit as i64));

        debug!("Executing query: {}", sql);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            collect_items(&mut stmt, &param_refs)
        })
    }

    /// Number of rows for a (source, platform, feed type) triple
    pub fn count_by_source_triple(
        &self,
        source: &str,
        platform: &str,
        feed_type: &str,
    ) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM content_items WHERE source = ?1 AND platform = ?2 AND feed_type = ?3",
                params![source, platform, feed_type],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Row counts per status for one (source, feed type)
    pub fn status_counts(&self, source: &str, feed_type: &str) -> Result<StatusCounts, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM content_items WHERE source = ?1 AND feed_type = ?2 GROUP BY status",
            )?;
            let mut rows = stmt.query(params![source, feed_type])?;

            let mut counts = StatusCounts::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                match status.parse::<ItemStatus>()? {
                    ItemStatus::Pending => counts.pending = count as u64,
                    ItemStatus::Published => counts.published = count as u64,
                    ItemStatus::Skipped => counts.skipped = count as u64,
                }
            }
            Ok(counts)
        })
    }
}

fn find_in(conn: &Connection, hash: &ContentHash, source: &str) -> Result<Option<ContentItem>, StoreError> {
    let mut stmt = conn.prepare("SELECT * FROM content_items WHERE content_hash = ?1 AND source = ?2")?;
    let mut rows = stmt.query(params![hash.as_str(), source])?;

    match rows.next()? {
        Some(row) => Ok(Some(item_from_row(row)?)),
        None => Ok(None),
    }
}
