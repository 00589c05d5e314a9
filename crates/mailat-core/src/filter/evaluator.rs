//! Filter rule evaluation against received emails.

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use super::model::{
    ActionType, Combinator, ConditionField, FilterAction, FilterCondition, FilterRule, Operator,
    RuleId,
};
use super::repository::FilterRepository;
use crate::Result;
use crate::mail::{EmailId, EmailRecord, EmailUpdate, FieldChange, Folder, MailRepository};

/// Whether the conditions hold for an email under the given combinator.
///
/// An empty condition list never matches, for either combinator.
#[must_use]
pub fn matches(combinator: Combinator, conditions: &[FilterCondition], email: &EmailRecord) -> bool {
    if conditions.is_empty() {
        return false;
    }
    match combinator {
        Combinator::All => conditions.iter().all(|c| condition_matches(c, email)),
        Combinator::Any => conditions.iter().any(|c| condition_matches(c, email)),
    }
}

/// Whether a single condition holds for an email.
///
/// Comparison is case-insensitive: both the field value and the literal are
/// lowercased, including regex patterns. An invalid pattern never matches.
#[must_use]
pub fn condition_matches(condition: &FilterCondition, email: &EmailRecord) -> bool {
    let value = match condition.field {
        ConditionField::From => email.from_email.clone(),
        ConditionField::To => email.to.join(", "),
        ConditionField::Subject => email.subject.clone(),
        ConditionField::Body => email.text_body.clone().unwrap_or_default(),
        ConditionField::HasAttachment => {
            let expected = if email.has_attachments { "true" } else { "false" };
            return condition.value == expected;
        }
        ConditionField::Other => return false,
    };

    let value = value.to_lowercase();
    let literal = condition.value.to_lowercase();

    match condition.operator {
        Operator::Contains => value.contains(&literal),
        Operator::Equals => value == literal,
        Operator::StartsWith => value.starts_with(&literal),
        Operator::EndsWith => value.ends_with(&literal),
        Operator::Regex => match Regex::new(&literal) {
            Ok(re) => re.is_match(&value),
            Err(e) => {
                debug!("Invalid filter pattern {:?}: {e}", condition.value);
                false
            }
        },
        Operator::Other => false,
    }
}

/// The record change an action causes, if any.
///
/// Sieve-only actions and a folder move without a folder name have no effect.
#[must_use]
pub fn action_change(action: &FilterAction, now: DateTime<Utc>) -> Option<FieldChange> {
    match action.kind {
        ActionType::MoveToFolder => action
            .value
            .as_deref()
            .filter(|folder| !folder.is_empty())
            .map(|folder| FieldChange::Folder(Folder::parse(folder))),
        ActionType::Star => Some(FieldChange::Starred(true)),
        ActionType::MarkRead => Some(FieldChange::Read { at: now }),
        ActionType::Archive => Some(FieldChange::Archived(true)),
        ActionType::Trash => Some(FieldChange::Trashed { at: now }),
        ActionType::Forward
        | ActionType::Reject
        | ActionType::StopProcessing
        | ActionType::Other => None,
    }
}

/// Applies an organization's filter rules to a stored email.
#[derive(Debug, Clone)]
pub struct Evaluator {
    mail: MailRepository,
    filters: FilterRepository,
}

impl Evaluator {
    /// Create an evaluator over the given repositories.
    #[must_use]
    pub const fn new(mail: MailRepository, filters: FilterRepository) -> Self {
        Self { mail, filters }
    }

    /// Evaluate every visible rule against the email and apply the actions of
    /// each rule that matches.
    ///
    /// Rules apply cumulatively in priority order. Each action is its own
    /// update; a failed update or match record is logged and skipped.
    /// Returns the IDs of the rules that matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the email or its rules cannot be loaded.
    pub async fn evaluate(&self, email_id: EmailId) -> Result<Vec<RuleId>> {
        let email = self.mail.get(email_id).await?;
        let rules = self
            .filters
            .rules_for(email.org_id, email.identity_id)
            .await?;

        let mut matched = Vec::new();
        for rule in &rules {
            if !matches(rule.combinator, &rule.conditions, &email) {
                continue;
            }
            self.apply_rule(rule, email_id).await;
            matched.push(rule.id);
        }
        Ok(matched)
    }

    async fn apply_rule(&self, rule: &FilterRule, email_id: EmailId) {
        let now = Utc::now();
        for action in &rule.actions {
            let Some(change) = action_change(action, now) else {
                continue;
            };
            let update = EmailUpdate::new().with(change);
            if let Err(e) = self.mail.apply(email_id, &update).await {
                warn!(
                    "Filter {} action {:?} failed on email {email_id}: {e}",
                    rule.id, action.kind
                );
            }
        }

        if let Err(e) = self.filters.record_match(rule.id, now).await {
            warn!("Failed to record match for filter {}: {e}", rule.id);
        }
        info!("Applied filter {} ({}) to email {email_id}", rule.id, rule.name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::{DomainId, IdentityId, OrgId};
    use crate::mail::Verdicts;

    fn email() -> EmailRecord {
        EmailRecord {
            id: EmailId::new(1),
            org_id: OrgId::new(1),
            domain_id: DomainId::new(1),
            identity_id: IdentityId::new(1),
            message_id: "<m@x>".to_string(),
            upstream_message_id: "u".to_string(),
            thread_id: None,
            from_email: "Billing@Shop.example".to_string(),
            from_name: None,
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            cc: vec![],
            subject: "Your Invoice #42".to_string(),
            snippet: String::new(),
            folder: Folder::Inbox,
            is_read: false,
            read_at: None,
            is_starred: false,
            is_archived: false,
            is_trashed: false,
            trashed_at: None,
            is_spam: false,
            verdicts: Verdicts::default(),
            storage: None,
            text_body: Some("Total due: 10 EUR".to_string()),
            html_body: None,
            size_bytes: 0,
            has_attachments: true,
            received_at: Utc::now(),
        }
    }

    fn cond(field: ConditionField, operator: Operator, value: &str) -> FilterCondition {
        FilterCondition::new(field, operator, value)
    }

    #[test]
    fn test_empty_conditions_never_match() {
        assert!(!matches(Combinator::All, &[], &email()));
        assert!(!matches(Combinator::Any, &[], &email()));
    }

    #[test]
    fn test_operators_are_case_insensitive() {
        let e = email();
        assert!(condition_matches(&cond(ConditionField::Subject, Operator::Contains, "INVOICE"), &e));
        assert!(condition_matches(&cond(ConditionField::From, Operator::Equals, "billing@shop.example"), &e));
        assert!(condition_matches(&cond(ConditionField::Subject, Operator::StartsWith, "your"), &e));
        assert!(condition_matches(&cond(ConditionField::From, Operator::EndsWith, "SHOP.EXAMPLE"), &e));
        assert!(condition_matches(&cond(ConditionField::Body, Operator::Contains, "due"), &e));
        assert!(!condition_matches(&cond(ConditionField::Subject, Operator::Equals, "invoice"), &e));
    }

    #[test]
    fn test_to_field_joins_recipients() {
        let e = email();
        assert!(condition_matches(
            &cond(ConditionField::To, Operator::Equals, "a@example.com, b@example.com"),
            &e
        ));
    }

    #[test]
    fn test_has_attachment_compares_exact_string() {
        let mut e = email();
        assert!(condition_matches(&cond(ConditionField::HasAttachment, Operator::Equals, "true"), &e));
        assert!(!condition_matches(&cond(ConditionField::HasAttachment, Operator::Equals, "TRUE"), &e));
        e.has_attachments = false;
        assert!(condition_matches(&cond(ConditionField::HasAttachment, Operator::Contains, "false"), &e));
    }

    #[test]
    fn test_regex_pattern_is_lowercased() {
        let e = email();
        // `[A-Z]` becomes `[a-z]`, which matches the lowercased value.
        assert!(condition_matches(&cond(ConditionField::Subject, Operator::Regex, r"INVOICE #\d+"), &e));
        assert!(condition_matches(&cond(ConditionField::Subject, Operator::Regex, "^[A-Z]+ INVOICE"), &e));
        assert!(!condition_matches(&cond(ConditionField::Subject, Operator::Regex, "("), &e));
    }

    #[test]
    fn test_unknown_field_or_operator_never_matches() {
        let e = email();
        assert!(!condition_matches(&cond(ConditionField::Other, Operator::Contains, ""), &e));
        assert!(!condition_matches(&cond(ConditionField::Subject, Operator::Other, ""), &e));
    }

    #[test]
    fn test_combinators() {
        let e = email();
        let hit = cond(ConditionField::Subject, Operator::Contains, "invoice");
        let miss = cond(ConditionField::Subject, Operator::Contains, "newsletter");
        assert!(matches(Combinator::All, &[hit.clone()], &e));
        assert!(!matches(Combinator::All, &[hit.clone(), miss.clone()], &e));
        assert!(matches(Combinator::Any, &[miss.clone(), hit], &e));
        assert!(!matches(Combinator::Any, &[miss], &e));
    }

    #[test]
    fn test_action_changes() {
        let now = Utc::now();
        assert_eq!(
            action_change(&FilterAction::with_value(ActionType::MoveToFolder, "Receipts"), now),
            Some(FieldChange::Folder(Folder::Named("Receipts".to_string())))
        );
        assert_eq!(action_change(&FilterAction::new(ActionType::MoveToFolder), now), None);
        assert_eq!(
            action_change(&FilterAction::new(ActionType::Trash), now),
            Some(FieldChange::Trashed { at: now })
        );
        assert_eq!(action_change(&FilterAction::new(ActionType::StopProcessing), now), None);
        assert_eq!(
            action_change(&FilterAction::with_value(ActionType::Forward, "x@y"), now),
            None
        );
    }
}
