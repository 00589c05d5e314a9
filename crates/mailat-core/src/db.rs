//! SQLite connection pool and schema.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;

/// Schema statements, applied in order on every open.
const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS domains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id INTEGER NOT NULL,
        name TEXT NOT NULL UNIQUE,
        receiving_container TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS identities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain_id INTEGER NOT NULL REFERENCES domains(id),
        email TEXT NOT NULL,
        is_catch_all INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_identities_email ON identities(email)
    ",
    r"
    CREATE TABLE IF NOT EXISTS received_emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id INTEGER NOT NULL,
        domain_id INTEGER NOT NULL,
        identity_id INTEGER NOT NULL,
        message_id TEXT NOT NULL UNIQUE,
        upstream_message_id TEXT NOT NULL,
        thread_id TEXT,
        from_email TEXT NOT NULL,
        from_name TEXT,
        to_emails TEXT NOT NULL DEFAULT '[]',
        cc_emails TEXT NOT NULL DEFAULT '[]',
        subject TEXT NOT NULL,
        snippet TEXT NOT NULL,
        storage_container TEXT,
        storage_key TEXT,
        folder TEXT NOT NULL DEFAULT 'inbox',
        is_read INTEGER NOT NULL DEFAULT 0,
        read_at TEXT,
        is_starred INTEGER NOT NULL DEFAULT 0,
        is_archived INTEGER NOT NULL DEFAULT 0,
        is_trashed INTEGER NOT NULL DEFAULT 0,
        trashed_at TEXT,
        is_spam INTEGER NOT NULL DEFAULT 0,
        spam_verdict TEXT,
        virus_verdict TEXT,
        spf_verdict TEXT,
        dkim_verdict TEXT,
        dmarc_verdict TEXT,
        text_body TEXT,
        html_body TEXT,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        has_attachments INTEGER NOT NULL DEFAULT 0,
        received_at TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS email_attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email_id INTEGER NOT NULL REFERENCES received_emails(id),
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        checksum TEXT NOT NULL,
        content_id TEXT,
        is_inline INTEGER NOT NULL DEFAULT 0,
        storage_container TEXT,
        storage_key TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_email_attachments_email ON email_attachments(email_id)
    ",
    r"
    CREATE TABLE IF NOT EXISTS inbox_filters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id INTEGER NOT NULL,
        identity_id INTEGER,
        name TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        condition_logic TEXT NOT NULL DEFAULT 'all',
        conditions TEXT NOT NULL DEFAULT '[]',
        actions TEXT NOT NULL DEFAULT '[]',
        active INTEGER NOT NULL DEFAULT 1,
        match_count INTEGER NOT NULL DEFAULT 0,
        last_matched_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_inbox_filters_org ON inbox_filters(org_id, active)
    ",
];

/// Shared database handle.
///
/// Repositories are constructed from [`Database::pool`] so that they all
/// see the same tables.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// A single connection that never expires keeps the memory database alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Returns the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}
