//! Email storage repository.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row};

use super::model::{
    Attachment, EmailId, EmailRecord, Folder, NewAttachment, NewEmail, StoragePointer, Verdicts,
};
use super::update::{ColumnValue, EmailUpdate};
use crate::identity::{DomainId, IdentityId, OrgId};
use crate::{Error, Result};

/// Result of inserting an email record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was created.
    Created(EmailId),
    /// A record with the same Message-ID already exists.
    Duplicate,
}

/// Repository for received emails and their attachments.
#[derive(Debug, Clone)]
pub struct MailRepository {
    pool: SqlitePool,
}

impl MailRepository {
    /// Create a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new email record.
    ///
    /// A Message-ID that is already stored yields [`InsertOutcome::Duplicate`]
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails for any other reason.
    pub async fn insert(&self, email: &NewEmail) -> Result<InsertOutcome> {
        let to = serde_json::to_string(&email.to)?;
        let cc = serde_json::to_string(&email.cc)?;
        let (container, key) = email
            .storage
            .as_ref()
            .map_or((None, None), |p| (Some(p.container.as_str()), Some(p.key.as_str())));

        let result = sqlx::query(
            r"
            INSERT INTO received_emails
                (org_id, domain_id, identity_id, message_id, upstream_message_id, thread_id,
                 from_email, from_name, to_emails, cc_emails, subject, snippet,
                 storage_container, storage_key, folder, is_spam,
                 spam_verdict, virus_verdict, spf_verdict, dkim_verdict, dmarc_verdict,
                 received_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(email.org_id.0)
        .bind(email.domain_id.0)
        .bind(email.identity_id.0)
        .bind(&email.message_id)
        .bind(&email.upstream_message_id)
        .bind(&email.thread_id)
        .bind(&email.from_email)
        .bind(&email.from_name)
        .bind(to)
        .bind(cc)
        .bind(&email.subject)
        .bind(&email.snippet)
        .bind(container)
        .bind(key)
        .bind(email.folder.as_str())
        .bind(email.verdicts.is_spam())
        .bind(&email.verdicts.spam)
        .bind(&email.verdicts.virus)
        .bind(&email.verdicts.spf)
        .bind(&email.verdicts.dkim)
        .bind(&email.verdicts.dmarc)
        .bind(email.received_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Created(EmailId::new(done.last_insert_rowid()))),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get an email by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmailNotFound`] if no such email exists, or an error
    /// if the query or row decoding fails.
    pub async fn get(&self, id: EmailId) -> Result<EmailRecord> {
        let row = sqlx::query("SELECT * FROM received_emails WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::EmailNotFound(id.0))?;

        row_to_email(&row)
    }

    /// Find an email by its Message-ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or row decoding fails.
    pub async fn find_by_message_id(&self, message_id: &str) -> Result<Option<EmailRecord>> {
        let row = sqlx::query("SELECT * FROM received_emails WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_email).transpose()
    }

    /// Count stored emails.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM received_emails")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// Apply a partial update in a single statement.
    ///
    /// An empty update is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmailNotFound`] if no row was updated, or an error if
    /// the database query fails.
    pub async fn apply(&self, id: EmailId, update: &EmailUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE received_emails SET ");
        {
            let mut set = query.separated(", ");
            for change in update.changes() {
                for (column, value) in change.assignments() {
                    set.push(format!("{column} = "));
                    match value {
                        ColumnValue::Text(v) => set.push_bind_unseparated(v),
                        ColumnValue::OptionalText(v) => set.push_bind_unseparated(v),
                        ColumnValue::Integer(v) => set.push_bind_unseparated(v),
                        ColumnValue::Flag(v) => set.push_bind_unseparated(v),
                    };
                }
            }
        }
        query.push(" WHERE id = ").push_bind(id.0);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::EmailNotFound(id.0));
        }
        Ok(())
    }

    /// Store an attachment row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_attachment(&self, attachment: &NewAttachment) -> Result<Attachment> {
        let (container, key) = attachment
            .storage
            .as_ref()
            .map_or((None, None), |p| (Some(p.container.as_str()), Some(p.key.as_str())));

        let result = sqlx::query(
            r"
            INSERT INTO email_attachments
                (email_id, filename, content_type, size_bytes, checksum, content_id,
                 is_inline, storage_container, storage_key)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(attachment.email_id.0)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(attachment.size_bytes)
        .bind(&attachment.checksum)
        .bind(&attachment.content_id)
        .bind(attachment.is_inline)
        .bind(container)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(Attachment {
            id: result.last_insert_rowid(),
            data: attachment.clone(),
        })
    }

    /// List attachments of an email, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn attachments(&self, email_id: EmailId) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(
            r"
            SELECT id, email_id, filename, content_type, size_bytes, checksum, content_id,
                   is_inline, storage_container, storage_key
            FROM email_attachments
            WHERE email_id = ?
            ORDER BY id
            ",
        )
        .bind(email_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Attachment {
                id: row.get("id"),
                data: NewAttachment {
                    email_id: EmailId::new(row.get("email_id")),
                    filename: row.get("filename"),
                    content_type: row.get("content_type"),
                    size_bytes: row.get("size_bytes"),
                    checksum: row.get("checksum"),
                    content_id: row.get("content_id"),
                    is_inline: row.get::<bool, _>("is_inline"),
                    storage: StoragePointer::from_columns(
                        row.get("storage_container"),
                        row.get("storage_key"),
                    ),
                },
            })
            .collect())
    }
}

fn parse_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_email(row: &SqliteRow) -> Result<EmailRecord> {
    let to: Vec<String> = serde_json::from_str(&row.get::<String, _>("to_emails"))?;
    let cc: Vec<String> = serde_json::from_str(&row.get::<String, _>("cc_emails"))?;

    Ok(EmailRecord {
        id: EmailId::new(row.get("id")),
        org_id: OrgId::new(row.get("org_id")),
        domain_id: DomainId::new(row.get("domain_id")),
        identity_id: IdentityId::new(row.get("identity_id")),
        message_id: row.get("message_id"),
        upstream_message_id: row.get("upstream_message_id"),
        thread_id: row.get("thread_id"),
        from_email: row.get("from_email"),
        from_name: row.get("from_name"),
        to,
        cc,
        subject: row.get("subject"),
        snippet: row.get("snippet"),
        folder: Folder::parse(&row.get::<String, _>("folder")),
        is_read: row.get::<bool, _>("is_read"),
        read_at: parse_timestamp(row.get("read_at")),
        is_starred: row.get::<bool, _>("is_starred"),
        is_archived: row.get::<bool, _>("is_archived"),
        is_trashed: row.get::<bool, _>("is_trashed"),
        trashed_at: parse_timestamp(row.get("trashed_at")),
        is_spam: row.get::<bool, _>("is_spam"),
        verdicts: Verdicts {
            spam: row.get("spam_verdict"),
            virus: row.get("virus_verdict"),
            spf: row.get("spf_verdict"),
            dkim: row.get("dkim_verdict"),
            dmarc: row.get("dmarc_verdict"),
        },
        storage: StoragePointer::from_columns(
            row.get("storage_container"),
            row.get("storage_key"),
        ),
        text_body: row.get("text_body"),
        html_body: row.get("html_body"),
        size_bytes: row.get("size_bytes"),
        has_attachments: row.get::<bool, _>("has_attachments"),
        received_at: parse_timestamp(row.get("received_at")).unwrap_or_default(),
    })
}
