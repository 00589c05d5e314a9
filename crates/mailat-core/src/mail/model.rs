//! Email record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{DomainId, IdentityId, OrgId};

/// Maximum snippet length in characters, before the ellipsis.
pub const SNIPPET_LENGTH: usize = 200;

/// Unique identifier for a received email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailId(pub i64);

impl EmailId {
    /// Create a new email ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Folder an email is filed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Folder {
    /// Regular inbox.
    #[default]
    Inbox,
    /// Spam folder, chosen at intake from the upstream spam verdict.
    Spam,
    /// Any folder a filter moved the email to.
    Named(String),
}

impl Folder {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "inbox" => Self::Inbox,
            "spam" => Self::Spam,
            other => Self::Named(other.to_string()),
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "inbox",
            Self::Spam => "spam",
            Self::Named(name) => name,
        }
    }
}

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePointer {
    /// Container (bucket) name.
    pub container: String,
    /// Object key within the container.
    pub key: String,
}

impl StoragePointer {
    /// Create a new pointer.
    #[must_use]
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    pub(crate) fn from_columns(container: Option<String>, key: Option<String>) -> Option<Self> {
        Some(Self::new(container?, key?))
    }
}

/// Upstream verdict statuses (`PASS`, `FAIL`, `GRAY`, `PROCESSING_FAILED`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdicts {
    /// Spam scan.
    pub spam: Option<String>,
    /// Virus scan.
    pub virus: Option<String>,
    /// SPF check.
    pub spf: Option<String>,
    /// DKIM check.
    pub dkim: Option<String>,
    /// DMARC check.
    pub dmarc: Option<String>,
}

impl Verdicts {
    /// Whether the spam verdict signals failure.
    #[must_use]
    pub fn is_spam(&self) -> bool {
        self.spam.as_deref() == Some("FAIL")
    }
}

/// A received email as created by intake.
#[derive(Debug, Clone)]
pub struct NewEmail {
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning domain.
    pub domain_id: DomainId,
    /// Identity that resolved the recipient.
    pub identity_id: IdentityId,
    /// Message-ID, unique across all records.
    pub message_id: String,
    /// Identifier assigned by the receiving service.
    pub upstream_message_id: String,
    /// Thread identifier derived from reply headers.
    pub thread_id: Option<String>,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// To recipients.
    pub to: Vec<String>,
    /// Cc recipients.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Preview text.
    pub snippet: String,
    /// Initial folder (`inbox` or `spam`).
    pub folder: Folder,
    /// Upstream verdicts.
    pub verdicts: Verdicts,
    /// Where the raw message is stored.
    pub storage: Option<StoragePointer>,
    /// When the receiving service accepted the message.
    pub received_at: DateTime<Utc>,
}

/// A persisted email record.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct EmailRecord {
    /// Unique identifier.
    pub id: EmailId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning domain.
    pub domain_id: DomainId,
    /// Identity that resolved the recipient.
    pub identity_id: IdentityId,
    /// Message-ID.
    pub message_id: String,
    /// Identifier assigned by the receiving service.
    pub upstream_message_id: String,
    /// Thread identifier.
    pub thread_id: Option<String>,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// To recipients.
    pub to: Vec<String>,
    /// Cc recipients.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Preview text.
    pub snippet: String,
    /// Current folder.
    pub folder: Folder,
    /// Read flag.
    pub is_read: bool,
    /// When the email was marked read.
    pub read_at: Option<DateTime<Utc>>,
    /// Starred flag.
    pub is_starred: bool,
    /// Archived flag.
    pub is_archived: bool,
    /// Trashed flag.
    pub is_trashed: bool,
    /// When the email was trashed.
    pub trashed_at: Option<DateTime<Utc>>,
    /// Whether the upstream spam verdict failed.
    pub is_spam: bool,
    /// Upstream verdicts.
    pub verdicts: Verdicts,
    /// Where the raw message is stored.
    pub storage: Option<StoragePointer>,
    /// Decoded plain-text body, once the decoder has run.
    pub text_body: Option<String>,
    /// Decoded HTML body, once the decoder has run.
    pub html_body: Option<String>,
    /// Raw message size in bytes.
    pub size_bytes: i64,
    /// Whether the decoder extracted any attachment.
    pub has_attachments: bool,
    /// When the receiving service accepted the message.
    pub received_at: DateTime<Utc>,
}

/// An attachment extracted by the decoder, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Owning email.
    pub email_id: EmailId,
    /// Resolved filename.
    pub filename: String,
    /// MIME type (`type/subtype`), empty if the part had none usable.
    pub content_type: String,
    /// Size of the stored bytes.
    pub size_bytes: i64,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: String,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Whether the part was marked `inline`.
    pub is_inline: bool,
    /// Where the bytes were written, if the upload succeeded.
    pub storage: Option<StoragePointer>,
}

/// A persisted attachment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Unique identifier.
    pub id: i64,
    /// Attachment data.
    pub data: NewAttachment,
}

/// Builds a preview from the first [`SNIPPET_LENGTH`] characters of `text`,
/// appending `...` when truncated.
#[must_use]
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_LENGTH) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_roundtrip() {
        for folder in [
            Folder::Inbox,
            Folder::Spam,
            Folder::Named("Receipts".to_string()),
        ] {
            assert_eq!(Folder::parse(folder.as_str()), folder);
        }
    }

    #[test]
    fn test_verdicts_is_spam() {
        let mut verdicts = Verdicts::default();
        assert!(!verdicts.is_spam());
        verdicts.spam = Some("PASS".to_string());
        assert!(!verdicts.is_spam());
        verdicts.spam = Some("FAIL".to_string());
        assert!(verdicts.is_spam());
    }

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("Hello"), "Hello");
        assert_eq!(snippet(""), "");
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let text = "é".repeat(SNIPPET_LENGTH + 5);
        let s = snippet(&text);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_LENGTH + 3);
    }

    #[test]
    fn test_snippet_exact_length_not_truncated() {
        let text = "a".repeat(SNIPPET_LENGTH);
        assert_eq!(snippet(&text), text);
    }

    #[test]
    fn test_storage_pointer_requires_both_columns() {
        assert!(StoragePointer::from_columns(Some("b".into()), None).is_none());
        assert_eq!(
            StoragePointer::from_columns(Some("b".into()), Some("k".into())),
            Some(StoragePointer::new("b", "k"))
        );
    }
}
