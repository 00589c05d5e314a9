//! End-to-end tests: notification payload in, decoded and filtered record out.
//!
//! These tests use an in-memory database and object store, so no receiving
//! service or disk access is needed.

#![allow(clippy::unwrap_used)]

use mailat_core::filter::{
    ActionType, Combinator, ConditionField, FilterAction, FilterCondition, NewFilterRule, Operator,
};
use mailat_core::identity::{IdentityId, OrgId};
use mailat_core::ingest::{InboundTask, parse_payload};
use mailat_core::mail::Folder;
use mailat_core::{
    ChannelQueue, Database, Decoder, Error, Evaluator, FilterRepository, IdentityRepository,
    Intake, IntakeOutcome, MailRepository, MemoryObjectStore, ObjectStore, Processor, run_worker,
};
use sha2::{Digest, Sha256};

const ORG: OrgId = OrgId(1);
const CONTAINER: &str = "inbound-mail";

struct Harness {
    identities: IdentityRepository,
    mail: MailRepository,
    filters: FilterRepository,
    store: MemoryObjectStore,
    bob: IdentityId,
}

impl Harness {
    async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool().clone();
        let identities = IdentityRepository::new(pool.clone());
        let domain = identities
            .create_domain(ORG, "example.com", Some(CONTAINER))
            .await
            .unwrap();
        let bob = identities
            .create_identity(domain.id, "bob@example.com", false)
            .await
            .unwrap();
        identities
            .create_identity(domain.id, "everything@example.com", true)
            .await
            .unwrap();

        Self {
            identities,
            mail: MailRepository::new(pool.clone()),
            filters: FilterRepository::new(pool),
            store: MemoryObjectStore::new(),
            bob: bob.id,
        }
    }

    fn processor(&self) -> Processor<MemoryObjectStore> {
        Processor::new(
            Decoder::new(self.mail.clone(), self.store.clone()),
            Evaluator::new(self.mail.clone(), self.filters.clone()),
        )
    }

    async fn rule(
        &self,
        name: &str,
        priority: i64,
        conditions: Vec<FilterCondition>,
        actions: Vec<FilterAction>,
    ) {
        self.filters
            .create(&NewFilterRule {
                org_id: ORG,
                identity_id: None,
                name: name.to_string(),
                priority,
                combinator: Combinator::All,
                conditions,
                actions,
                active: true,
            })
            .await
            .unwrap();
    }

    /// Ingest a payload and run its queued tasks to completion.
    async fn deliver(&self, payload: &str) -> mailat_core::Result<IntakeOutcome> {
        let (queue, receiver) = ChannelQueue::new();
        let worker = tokio::spawn(run_worker(receiver, self.processor()));
        let intake = Intake::new(self.identities.clone(), self.mail.clone(), queue);

        let notification = parse_payload(payload)?.unwrap();
        let outcome = intake.ingest(&notification).await;

        drop(intake);
        worker.await.unwrap();
        outcome
    }
}

fn payload(ses_id: &str, message_id: &str, subject: &str, recipients: &[&str]) -> String {
    serde_json::json!({
        "notificationType": "Received",
        "mail": {
            "timestamp": "2024-06-01T08:00:00.000Z",
            "source": "billing@vendor.example",
            "messageId": ses_id,
            "destination": recipients,
            "headers": [],
            "commonHeaders": {
                "from": ["Vendor Billing <billing@vendor.example>"],
                "to": recipients,
                "messageId": message_id,
                "subject": subject
            }
        },
        "receipt": {
            "timestamp": "2024-06-01T08:00:01.000Z",
            "recipients": recipients,
            "spamVerdict": {"status": "PASS"},
            "virusVerdict": {"status": "PASS"},
            "spfVerdict": {"status": "PASS"},
            "dkimVerdict": {"status": "PASS"},
            "dmarcVerdict": {"status": "PASS"},
            "action": {"type": "S3", "bucketName": CONTAINER, "objectKey": format!("raw/{ses_id}")}
        }
    })
    .to_string()
}

const MULTIPART: &[u8] = b"From: Vendor Billing <billing@vendor.example>\r\n\
Subject: Your Invoice\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Amount due: 12=2E50 EUR\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Amount due: 12.50 EUR</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--outer--\r\n";

#[tokio::test]
async fn invoice_is_decoded_and_filed() {
    let h = Harness::new().await;
    h.rule(
        "Receipts",
        10,
        vec![FilterCondition::new(
            ConditionField::Subject,
            Operator::Contains,
            "Invoice",
        )],
        vec![FilterAction::with_value(ActionType::MoveToFolder, "Receipts")],
    )
    .await;
    h.store
        .put(CONTAINER, "raw/ses-1", MULTIPART.to_vec())
        .await
        .unwrap();

    let outcome = h
        .deliver(&payload("ses-1", "<inv-1@vendor.example>", "Your Invoice", &["bob@example.com"]))
        .await
        .unwrap();
    let IntakeOutcome::Created(id) = outcome else {
        panic!("expected created, got {outcome:?}");
    };

    let email = h.mail.get(id).await.unwrap();
    assert_eq!(email.identity_id, h.bob);
    assert_eq!(email.folder, Folder::Named("Receipts".to_string()));
    assert_eq!(email.text_body.as_deref(), Some("Amount due: 12.50 EUR"));
    assert_eq!(email.html_body.as_deref(), Some("<p>Amount due: 12.50 EUR</p>"));
    assert_eq!(email.snippet, "Amount due: 12.50 EUR");
    assert!(email.has_attachments);
    assert_eq!(email.size_bytes, i64::try_from(MULTIPART.len()).unwrap());

    let attachments = h.mail.attachments(id).await.unwrap();
    assert_eq!(attachments.len(), 1);
    let pdf = &attachments[0].data;
    let checksum = hex::encode(Sha256::digest(b"%PDF-1.4"));
    assert_eq!(pdf.filename, "invoice.pdf");
    assert_eq!(pdf.content_type, "application/pdf");
    assert_eq!(pdf.size_bytes, 8);
    assert_eq!(pdf.checksum, checksum);

    let key = format!("attachments/{id}/{checksum}");
    assert_eq!(h.store.fetch(CONTAINER, &key).await.unwrap(), b"%PDF-1.4");

    let rules = h.filters.rules_for_org(ORG).await.unwrap();
    assert_eq!(rules[0].match_count, 1);
    assert!(rules[0].last_matched_at.is_some());
}

#[tokio::test]
async fn catch_all_receives_unknown_local_parts() {
    let h = Harness::new().await;
    let id = match h
        .deliver(&payload("ses-2", "<m2@x>", "Hello", &["someone@EXAMPLE.com"]))
        .await
        .unwrap()
    {
        IntakeOutcome::Created(id) => id,
        other => panic!("expected created, got {other:?}"),
    };
    let email = h.mail.get(id).await.unwrap();
    assert_ne!(email.identity_id, h.bob);
}

#[tokio::test]
async fn unknown_domain_is_rejected() {
    let h = Harness::new().await;
    let err = h
        .deliver(&payload("ses-3", "<m3@x>", "Hello", &["bob@other.org"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IdentityNotFound { recipients } if recipients == ["bob@other.org"]));
    assert_eq!(h.mail.count().await.unwrap(), 0);
}

#[tokio::test]
async fn redelivery_is_a_duplicate() {
    let h = Harness::new().await;
    let first = payload("ses-4", "<same@x>", "Hello", &["bob@example.com"]);
    let second = payload("ses-5", "<same@x>", "Hello again", &["bob@example.com"]);

    assert!(matches!(h.deliver(&first).await.unwrap(), IntakeOutcome::Created(_)));
    assert_eq!(h.deliver(&second).await.unwrap(), IntakeOutcome::Duplicate);
    assert_eq!(h.mail.count().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_raw_message_leaves_record_undecoded() {
    let h = Harness::new().await;
    let id = match h
        .deliver(&payload("ses-6", "<m6@x>", "No body stored", &["bob@example.com"]))
        .await
        .unwrap()
    {
        IntakeOutcome::Created(id) => id,
        other => panic!("expected created, got {other:?}"),
    };
    let email = h.mail.get(id).await.unwrap();
    assert_eq!(email.text_body, None);
    assert_eq!(email.snippet, "No body stored");
    assert!(!email.has_attachments);
}

#[tokio::test]
async fn spam_verdict_files_into_spam() {
    let h = Harness::new().await;
    let raw = payload("ses-7", "<m7@x>", "Win", &["bob@example.com"])
        .replace(r#""spamVerdict":{"status":"PASS"}"#, r#""spamVerdict":{"status":"FAIL"}"#);
    let IntakeOutcome::Created(id) = h.deliver(&raw).await.unwrap() else {
        panic!("expected created");
    };
    let email = h.mail.get(id).await.unwrap();
    assert_eq!(email.folder, Folder::Spam);
}

#[tokio::test]
async fn rules_without_conditions_never_fire() {
    let h = Harness::new().await;
    h.rule("Empty", 5, Vec::new(), vec![FilterAction::new(ActionType::Star)])
        .await;
    let IntakeOutcome::Created(id) = h
        .deliver(&payload("ses-8", "<m8@x>", "Anything", &["bob@example.com"]))
        .await
        .unwrap()
    else {
        panic!("expected created");
    };

    assert!(!h.mail.get(id).await.unwrap().is_starred);
    assert_eq!(h.filters.rules_for_org(ORG).await.unwrap()[0].match_count, 0);
}

#[tokio::test]
async fn matching_rules_apply_cumulatively_in_priority_order() {
    let h = Harness::new().await;
    let from_vendor = || {
        vec![FilterCondition::new(
            ConditionField::From,
            Operator::EndsWith,
            "@vendor.example",
        )]
    };
    h.rule(
        "Later",
        1,
        from_vendor(),
        vec![FilterAction::with_value(ActionType::MoveToFolder, "Vendors")],
    )
    .await;
    h.rule(
        "First",
        9,
        from_vendor(),
        vec![
            FilterAction::with_value(ActionType::MoveToFolder, "Billing"),
            FilterAction::new(ActionType::MarkRead),
            FilterAction::new(ActionType::StopProcessing),
        ],
    )
    .await;

    let IntakeOutcome::Created(id) = h
        .deliver(&payload("ses-9", "<m9@x>", "Statement", &["bob@example.com"]))
        .await
        .unwrap()
    else {
        panic!("expected created");
    };

    // stop_processing has no effect on evaluation: the lower priority rule
    // still runs, last, and its folder wins.
    let email = h.mail.get(id).await.unwrap();
    assert_eq!(email.folder, Folder::Named("Vendors".to_string()));
    assert!(email.is_read);
    assert!(email.read_at.is_some());
}

#[tokio::test]
async fn processor_runs_tasks_directly() {
    let h = Harness::new().await;
    h.store
        .put(CONTAINER, "raw/ses-10", b"Subject: x\r\n\r\nplain body".to_vec())
        .await
        .unwrap();

    let (queue, mut receiver) = ChannelQueue::new();
    let intake = Intake::new(h.identities.clone(), h.mail.clone(), queue);
    let notification = parse_payload(&payload("ses-10", "<m10@x>", "x", &["bob@example.com"]))
        .unwrap()
        .unwrap();
    let IntakeOutcome::Created(id) = intake.ingest(&notification).await.unwrap() else {
        panic!("expected created");
    };
    drop(intake);

    let decode = receiver.recv().await.unwrap();
    assert!(matches!(decode, InboundTask::Decode { email_id, .. } if email_id == id));
    assert_eq!(
        receiver.recv().await.unwrap(),
        InboundTask::Evaluate { email_id: id }
    );
    assert!(receiver.recv().await.is_none());

    h.processor().run(decode).await;
    let email = h.mail.get(id).await.unwrap();
    assert_eq!(email.text_body.as_deref(), Some("plain body"));
    assert_eq!(email.snippet, "plain body");
}
