//! Partial updates to an email record.

use std::mem::discriminant;

use chrono::{DateTime, Utc};

use super::model::Folder;

/// A single column change on an email record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    /// Move to a folder.
    Folder(Folder),
    /// Set or clear the starred flag.
    Starred(bool),
    /// Mark read at the given time.
    Read {
        /// Read timestamp.
        at: DateTime<Utc>,
    },
    /// Set or clear the archived flag.
    Archived(bool),
    /// Move to trash at the given time.
    Trashed {
        /// Trash timestamp.
        at: DateTime<Utc>,
    },
    /// Replace the decoded text body.
    TextBody(Option<String>),
    /// Replace the decoded HTML body.
    HtmlBody(Option<String>),
    /// Replace the raw size.
    SizeBytes(i64),
    /// Set the attachment flag.
    HasAttachments(bool),
    /// Replace the preview text.
    Snippet(String),
}

/// Value bound for a single column assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnValue {
    Text(String),
    OptionalText(Option<String>),
    Integer(i64),
    Flag(bool),
}

impl FieldChange {
    /// Column assignments this change expands to.
    pub(crate) fn assignments(&self) -> Vec<(&'static str, ColumnValue)> {
        match self {
            Self::Folder(folder) => vec![("folder", ColumnValue::Text(folder.as_str().to_string()))],
            Self::Starred(on) => vec![("is_starred", ColumnValue::Flag(*on))],
            Self::Read { at } => vec![
                ("is_read", ColumnValue::Flag(true)),
                ("read_at", ColumnValue::Text(at.to_rfc3339())),
            ],
            Self::Archived(on) => vec![("is_archived", ColumnValue::Flag(*on))],
            Self::Trashed { at } => vec![
                ("is_trashed", ColumnValue::Flag(true)),
                ("trashed_at", ColumnValue::Text(at.to_rfc3339())),
            ],
            Self::TextBody(body) => vec![("text_body", ColumnValue::OptionalText(body.clone()))],
            Self::HtmlBody(body) => vec![("html_body", ColumnValue::OptionalText(body.clone()))],
            Self::SizeBytes(size) => vec![("size_bytes", ColumnValue::Integer(*size))],
            Self::HasAttachments(on) => vec![("has_attachments", ColumnValue::Flag(*on))],
            Self::Snippet(text) => vec![("snippet", ColumnValue::Text(text.clone()))],
        }
    }
}

/// An ordered set of field changes applied in one statement.
///
/// Setting the same field twice keeps the position of the first change and
/// the value of the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailUpdate {
    changes: Vec<FieldChange>,
}

impl EmailUpdate {
    /// Create an empty update.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Add a change, replacing any earlier change of the same field.
    #[must_use]
    pub fn with(mut self, change: FieldChange) -> Self {
        self.set(change);
        self
    }

    /// Add a change in place.
    pub fn set(&mut self, change: FieldChange) {
        match self
            .changes
            .iter_mut()
            .find(|c| discriminant(*c) == discriminant(&change))
        {
            Some(existing) => *existing = change,
            None => self.changes.push(change),
        }
    }

    /// Whether no field is changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The changes, in insertion order.
    #[must_use]
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }
}
