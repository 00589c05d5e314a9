//! Received email records and their attachments.

mod model;
mod repository;
mod update;

pub use model::{
    Attachment, EmailId, EmailRecord, Folder, NewAttachment, NewEmail, SNIPPET_LENGTH,
    StoragePointer, Verdicts, snippet,
};
pub use repository::{InsertOutcome, MailRepository};
pub use update::{EmailUpdate, FieldChange};
