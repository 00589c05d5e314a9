//! Turns a received-mail notification into a stored email record.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::notification::{Notification, Receipt, parse_address};
use super::tasks::{InboundTask, TaskQueue};
use crate::identity::{Domain, Identity, IdentityRepository, domain_of};
use crate::mail::{
    EmailId, Folder, InsertOutcome, MailRepository, NewEmail, StoragePointer, Verdicts, snippet,
};
use crate::{Error, Result};

/// What intake did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Not a `Received` notification.
    Ignored,
    /// The Message-ID was already stored.
    Duplicate,
    /// A new record was created and its background tasks queued.
    Created(EmailId),
}

/// Creates email records from notifications and queues their decoding and
/// filtering.
#[derive(Debug, Clone)]
pub struct Intake<Q> {
    identities: IdentityRepository,
    mail: MailRepository,
    queue: Q,
}

impl<Q: TaskQueue> Intake<Q> {
    /// Create an intake that queues background work on `queue`.
    #[must_use]
    pub const fn new(identities: IdentityRepository, mail: MailRepository, queue: Q) -> Self {
        Self {
            identities,
            mail,
            queue,
        }
    }

    /// Ingest one notification.
    ///
    /// The record is persisted before this returns; decoding and filtering
    /// run later from the queue. A failure to queue them is logged only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNotification`] if a `Received` notification
    /// has no receipt, [`Error::IdentityNotFound`] if no recipient resolves
    /// to an identity, or an error if a lookup or the insert fails.
    pub async fn ingest(&self, notification: &Notification) -> Result<IntakeOutcome> {
        if notification.notification_type != "Received" {
            debug!(
                "Skipping notification type {:?} for {}",
                notification.notification_type, notification.mail.message_id
            );
            return Ok(IntakeOutcome::Ignored);
        }
        let receipt = notification
            .receipt
            .as_ref()
            .ok_or_else(|| Error::InvalidNotification("missing receipt".to_string()))?;

        let identity = self.resolve_identity(&receipt.recipients).await?;
        let domain = self.identities.get_domain(identity.domain_id).await?;
        let email = build_email(notification, receipt, &identity, &domain);
        let pointer = email.storage.clone();
        let message_id = email.message_id.clone();

        let email_id = match self.mail.insert(&email).await? {
            InsertOutcome::Created(id) => id,
            InsertOutcome::Duplicate => {
                info!("Email already processed: {message_id}");
                return Ok(IntakeOutcome::Duplicate);
            }
        };
        info!(
            "Created received email {email_id} for {} ({message_id})",
            identity.email
        );

        match pointer {
            Some(pointer) => self.submit(InboundTask::Decode { email_id, pointer }),
            None => warn!("Email {email_id} has no storage location, body will not be decoded"),
        }
        self.submit(InboundTask::Evaluate { email_id });

        Ok(IntakeOutcome::Created(email_id))
    }

    /// First recipient that resolves, trying the exact address before the
    /// domain's catch-all for each recipient in turn.
    async fn resolve_identity(&self, recipients: &[String]) -> Result<Identity> {
        for recipient in recipients {
            if let Some(identity) = self.identities.find_by_address(recipient).await? {
                return Ok(identity);
            }
            if let Some(domain) = domain_of(recipient)
                && let Some(identity) = self.identities.find_catch_all(domain).await?
            {
                return Ok(identity);
            }
        }
        warn!("No identity found for recipients: {recipients:?}");
        Err(Error::IdentityNotFound {
            recipients: recipients.to_vec(),
        })
    }

    fn submit(&self, task: InboundTask) {
        if let Err(e) = self.queue.submit(task.clone()) {
            warn!("Failed to queue {task:?}: {e}");
        }
    }
}

fn build_email(
    notification: &Notification,
    receipt: &Receipt,
    identity: &Identity,
    domain: &Domain,
) -> NewEmail {
    let mail = &notification.mail;
    let headers = &mail.common_headers;
    let subject = headers.subject.clone().unwrap_or_default();

    let (from_email, from_name) = headers
        .from
        .first()
        .map_or_else(|| (String::new(), None), |from| parse_address(from));

    let verdicts = Verdicts {
        spam: receipt.spam_verdict.status(),
        virus: receipt.virus_verdict.status(),
        spf: receipt.spf_verdict.status(),
        dkim: receipt.dkim_verdict.status(),
        dmarc: receipt.dmarc_verdict.status(),
    };
    let folder = if verdicts.is_spam() {
        Folder::Spam
    } else {
        Folder::Inbox
    };

    NewEmail {
        org_id: identity.org_id,
        domain_id: identity.domain_id,
        identity_id: identity.id,
        message_id: headers
            .message_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| mail.message_id.clone()),
        upstream_message_id: mail.message_id.clone(),
        thread_id: mail.thread_id(),
        from_email,
        from_name,
        to: headers.to.clone(),
        cc: headers.cc.clone(),
        snippet: snippet(&subject),
        subject,
        folder,
        verdicts,
        storage: storage_pointer(notification, receipt, domain),
        received_at: DateTime::parse_from_rfc3339(&receipt.timestamp)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc)),
    }
}

/// Raw message location: the receipt's container and key, falling back to
/// the domain's receiving container and `incoming/<domain>/<message id>`.
fn storage_pointer(
    notification: &Notification,
    receipt: &Receipt,
    domain: &Domain,
) -> Option<StoragePointer> {
    let container = receipt
        .action
        .bucket_name
        .clone()
        .filter(|b| !b.is_empty())
        .or_else(|| domain.receiving_container.clone().filter(|c| !c.is_empty()))?;
    let key = receipt
        .action
        .object_key
        .clone()
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| format!("incoming/{}/{}", domain.name, notification.mail.message_id));
    Some(StoragePointer::new(container, key))
}
