//! Inbound mail notifications as delivered by the receiving service.
//!
//! The receiving service publishes one JSON notification per accepted
//! message, usually wrapped in a pub/sub envelope whose `Message` field holds
//! the notification as a string.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

/// Pub/sub envelope around a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Envelope {
    /// Envelope type: `Notification`, `SubscriptionConfirmation`, ...
    #[serde(rename = "Type")]
    pub kind: String,
    /// Envelope identifier.
    pub message_id: String,
    /// Topic that published the envelope.
    pub topic_arn: String,
    /// Embedded notification JSON.
    pub message: String,
    /// Publish time.
    pub timestamp: String,
}

impl Envelope {
    /// The embedded notification, or `None` for envelopes that carry no mail.
    ///
    /// # Errors
    ///
    /// Returns an error if a `Notification` envelope holds malformed JSON.
    pub fn notification(&self) -> Result<Option<Notification>> {
        if self.kind != "Notification" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.message)?))
    }
}

/// Parse a webhook payload that is either an [`Envelope`] or a bare
/// [`Notification`].
///
/// Returns `None` for envelopes that carry no notification.
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON of either shape.
pub fn parse_payload(payload: &str) -> Result<Option<Notification>> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if value.get("Type").is_some() {
        let envelope: Envelope = serde_json::from_value(value)?;
        envelope.notification()
    } else {
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// A mail-receiving notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    /// Notification type; only `Received` is ingested.
    pub notification_type: String,
    /// Message metadata.
    pub mail: MailInfo,
    /// Receipt details, present for `Received` notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

/// Message metadata extracted by the receiving service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailInfo {
    /// When the message was received.
    pub timestamp: String,
    /// Envelope sender.
    pub source: String,
    /// Identifier assigned by the receiving service.
    pub message_id: String,
    /// Envelope recipients.
    pub destination: Vec<String>,
    /// Whether `headers` was truncated.
    pub headers_truncated: bool,
    /// Raw header list, in message order.
    pub headers: Vec<HeaderField>,
    /// Commonly used headers, pre-parsed.
    pub common_headers: CommonHeaders,
}

impl MailInfo {
    /// Thread identifier derived from the first reply header.
    ///
    /// Takes the first `In-Reply-To` or `References` header with a
    /// non-empty value, hashes its first token with SHA-256, and keeps the
    /// first 8 bytes as hex.
    #[must_use]
    pub fn thread_id(&self) -> Option<String> {
        self.headers
            .iter()
            .filter(|h| {
                h.name.eq_ignore_ascii_case("In-Reply-To")
                    || h.name.eq_ignore_ascii_case("References")
            })
            .find_map(|h| h.value.split_whitespace().next())
            .map(|reference| {
                let digest = Sha256::digest(reference.as_bytes());
                hex::encode(&digest[..8])
            })
    }
}

/// A raw header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderField {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Pre-parsed common headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonHeaders {
    /// Return-Path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_path: Option<String>,
    /// From addresses.
    pub from: Vec<String>,
    /// Date header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// To addresses.
    pub to: Vec<String>,
    /// Cc addresses.
    pub cc: Vec<String>,
    /// Message-ID header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Subject header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Receipt details for an accepted message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Receipt {
    /// When the message was accepted (RFC 3339).
    pub timestamp: String,
    /// Time spent processing, in milliseconds.
    pub processing_time_millis: u64,
    /// Recipients the message was accepted for, in order.
    pub recipients: Vec<String>,
    /// Spam scan.
    pub spam_verdict: Verdict,
    /// Virus scan.
    pub virus_verdict: Verdict,
    /// SPF check.
    pub spf_verdict: Verdict,
    /// DKIM check.
    pub dkim_verdict: Verdict,
    /// DMARC check.
    pub dmarc_verdict: Verdict,
    /// Action the receiving service took.
    pub action: ReceiptAction,
}

/// A verdict status (`PASS`, `FAIL`, `GRAY`, `PROCESSING_FAILED`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    /// Status string.
    pub status: String,
}

impl Verdict {
    /// The status, or `None` when empty.
    #[must_use]
    pub fn status(&self) -> Option<String> {
        (!self.status.is_empty()).then(|| self.status.clone())
    }
}

/// Where the receiving service put the raw message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptAction {
    /// Action type, normally `S3`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Container the raw message was written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    /// Key of the raw message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    /// Key prefix configured on the receipt rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key_prefix: Option<String>,
}

/// Split `Name <addr>` into the address and an optional display name.
///
/// Values without angle brackets are returned whole as the address.
#[must_use]
pub fn parse_address(value: &str) -> (String, Option<String>) {
    if let Some(start) = value.find('<')
        && let Some(end) = value[start..].find('>')
    {
        let address = value[start + 1..start + end].to_string();
        let name = value[..start].trim().trim_matches('"').trim();
        return (address, (!name.is_empty()).then(|| name.to_string()));
    }
    (value.trim().to_string(), None)
}
