//! MIME decoding of stored raw messages into body fields and attachments.

use mailat_mime::{ContentType, Message, Part};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::Result;
use crate::mail::{
    EmailId, EmailUpdate, FieldChange, MailRepository, NewAttachment, StoragePointer, snippet,
};
use crate::objects::ObjectStore;

/// An attachment found in a message, with its decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAttachment {
    /// Resolved filename.
    pub filename: String,
    /// MIME type (`type/subtype`), empty if the part had none usable.
    pub content_type: String,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Whether the part was marked `inline`.
    pub is_inline: bool,
    /// Transfer-decoded bytes.
    pub bytes: Vec<u8>,
}

impl ExtractedAttachment {
    /// Hex SHA-256 of the decoded bytes.
    #[must_use]
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Bodies and attachments extracted from a raw message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Plain-text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Attachments, in document order.
    pub attachments: Vec<ExtractedAttachment>,
}

/// Split a raw message into its text body, html body, and attachments.
///
/// A message whose content type is missing or unparsable, or whose
/// multipart structure cannot be split, is treated as plain text. Among
/// multipart leaves the last qualifying part fills each body slot. A
/// single-part message of any type other than `text/plain` or `text/html`
/// yields no body at all.
#[must_use]
pub fn extract(raw: &[u8]) -> Extracted {
    let message = match Message::parse(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!("Unsplittable message, using body as text: {e}");
            let whole = Part::parse(raw);
            return Extracted {
                text: Some(String::from_utf8_lossy(&whole.body).into_owned()),
                ..Extracted::default()
            };
        }
    };

    let content_type = message
        .headers
        .get("content-type")
        .and_then(|value| ContentType::parse(value).ok());
    let Some(content_type) = content_type else {
        return Extracted {
            text: Some(message_text(&message)),
            ..Extracted::default()
        };
    };

    let mut extracted = Extracted::default();
    if content_type.is_multipart() {
        for part in &message.parts {
            classify_part(part, &mut extracted);
        }
    } else if content_type.is("text", "plain") {
        extracted.text = Some(message_text(&message));
    } else if content_type.is("text", "html") {
        extracted.html = Some(message_text(&message));
    }
    extracted
}

fn classify_part(part: &Part, extracted: &mut Extracted) {
    let content_type = part.content_type().ok();
    let disposition = part.disposition();
    let is_attachment = disposition.as_ref().is_some_and(|d| d.is_attachment());
    let is_inline = disposition.as_ref().is_some_and(|d| d.is_inline());
    let is_type = |main: &str, sub: &str| content_type.as_ref().is_some_and(|ct| ct.is(main, sub));

    if is_type("text", "plain") && !is_attachment {
        extracted.text = Some(part_text(part));
    } else if is_type("text", "html") && !is_attachment {
        extracted.html = Some(part_text(part));
    } else if is_attachment || is_inline {
        let filename = disposition
            .as_ref()
            .and_then(mailat_mime::ContentDisposition::filename)
            .or_else(|| {
                content_type
                    .as_ref()
                    .and_then(ContentType::name)
                    .filter(|name| !name.is_empty())
                    .map(|name| {
                        mailat_mime::encoding::decode_rfc2047(name)
                            .unwrap_or_else(|_| name.to_string())
                    })
            })
            .unwrap_or_else(|| "attachment".to_string());

        let bytes = part.decode_body().unwrap_or_else(|e| {
            debug!("Keeping undecodable attachment {filename:?} as written: {e}");
            part.body.clone()
        });

        extracted.attachments.push(ExtractedAttachment {
            filename,
            content_type: content_type.map(|ct| ct.essence()).unwrap_or_default(),
            content_id: part.content_id().map(ToString::to_string),
            is_inline,
            bytes,
        });
    }
}

fn part_text(part: &Part) -> String {
    part.body_text()
        .unwrap_or_else(|_| String::from_utf8_lossy(&part.body).into_owned())
}

fn message_text(message: &Message) -> String {
    message
        .body_text()
        .unwrap_or_else(|_| String::from_utf8_lossy(&message.body).into_owned())
}

/// Fills in body fields and attachments of stored emails from their raw
/// message.
#[derive(Debug, Clone)]
pub struct Decoder<S> {
    mail: MailRepository,
    store: S,
}

impl<S: ObjectStore> Decoder<S> {
    /// Create a decoder reading raw messages from `store`.
    #[must_use]
    pub const fn new(mail: MailRepository, store: S) -> Self {
        Self { mail, store }
    }

    /// Fetch, decode and persist the raw message behind `pointer`.
    ///
    /// A fetch failure is logged and leaves the record untouched. Attachment
    /// bytes go to `attachments/<email id>/<checksum>` in the message's
    /// container; a failed upload is logged and the row is stored without a
    /// location.
    ///
    /// # Errors
    ///
    /// Returns an error if updating the email record fails.
    pub async fn decode(&self, email_id: EmailId, pointer: &StoragePointer) -> Result<()> {
        let raw = match self.store.fetch(&pointer.container, &pointer.key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Failed to fetch raw message for email {email_id} from {}/{}: {e}",
                    pointer.container, pointer.key
                );
                return Ok(());
            }
        };

        let extracted = extract(&raw);
        let text = extracted.text.clone().unwrap_or_default();

        let mut update = EmailUpdate::new()
            .with(FieldChange::TextBody(extracted.text.clone()))
            .with(FieldChange::HtmlBody(extracted.html.clone()))
            .with(FieldChange::SizeBytes(
                i64::try_from(raw.len()).unwrap_or(i64::MAX),
            ))
            .with(FieldChange::HasAttachments(!extracted.attachments.is_empty()));
        if !text.is_empty() {
            update.set(FieldChange::Snippet(snippet(&text)));
        }
        self.mail.apply(email_id, &update).await?;

        for attachment in extracted.attachments {
            let checksum = attachment.checksum();
            let key = format!("attachments/{email_id}/{checksum}");
            let size_bytes = i64::try_from(attachment.bytes.len()).unwrap_or(i64::MAX);

            let storage = match self.store.put(&pointer.container, &key, attachment.bytes).await {
                Ok(()) => Some(StoragePointer::new(pointer.container.clone(), key)),
                Err(e) => {
                    warn!("Failed to store attachment {:?} of email {email_id}: {e}", attachment.filename);
                    None
                }
            };

            let row = NewAttachment {
                email_id,
                filename: attachment.filename,
                content_type: attachment.content_type,
                size_bytes,
                checksum,
                content_id: attachment.content_id,
                is_inline: attachment.is_inline,
                storage,
            };
            if let Err(e) = self.mail.add_attachment(&row).await {
                warn!("Failed to save attachment {:?} of email {email_id}: {e}", row.filename);
            }
        }

        info!("Decoded email {email_id} ({} bytes)", raw.len());
        Ok(())
    }
}
