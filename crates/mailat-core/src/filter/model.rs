//! Filter rule data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{IdentityId, OrgId};

/// Unique identifier for a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl RuleId {
    /// Create a new rule ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a rule's conditions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every condition must hold.
    #[default]
    All,
    /// At least one condition must hold.
    Any,
}

impl Combinator {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }

    /// Name of the equivalent Sieve test aggregation.
    #[must_use]
    pub const fn sieve_test(&self) -> &'static str {
        match self {
            Self::All => "allof",
            Self::Any => "anyof",
        }
    }
}

/// Email field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionField {
    /// Sender address.
    From,
    /// Recipients, joined by `, `.
    To,
    /// Subject line.
    Subject,
    /// Plain-text body.
    Body,
    /// Attachment presence, compared against `"true"` or `"false"`.
    HasAttachment,
    /// A field this version does not know.
    #[serde(other)]
    Other,
}

/// Comparison applied between a field and a condition's literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Substring containment.
    Contains,
    /// Exact equality.
    Equals,
    /// Prefix match.
    #[serde(alias = "starts_with")]
    StartsWith,
    /// Suffix match.
    #[serde(alias = "ends_with")]
    EndsWith,
    /// Regular-expression match.
    Regex,
    /// An operator this version does not know.
    #[serde(other)]
    Other,
}

/// A single test against one email field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field under test.
    pub field: ConditionField,
    /// Comparison.
    pub operator: Operator,
    /// Literal compared against.
    pub value: String,
}

impl FilterCondition {
    /// Create a condition.
    #[must_use]
    pub fn new(field: ConditionField, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Move to the folder named by the action value.
    MoveToFolder,
    /// Set the starred flag.
    #[serde(alias = "mark_starred")]
    Star,
    /// Mark as read.
    MarkRead,
    /// Set the archived flag.
    Archive,
    /// Move to trash.
    #[serde(alias = "delete")]
    Trash,
    /// Forward to the address in the action value (Sieve only).
    Forward,
    /// Reject with the action value as reason (Sieve only).
    Reject,
    /// Stop evaluating further Sieve rules (Sieve only).
    StopProcessing,
    /// An action this version does not know.
    #[serde(other)]
    Other,
}

/// An action with its optional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAction {
    /// Action kind.
    #[serde(rename = "type")]
    pub kind: ActionType,
    /// Argument, such as a folder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FilterAction {
    /// An action without an argument.
    #[must_use]
    pub const fn new(kind: ActionType) -> Self {
        Self { kind, value: None }
    }

    /// An action with an argument.
    #[must_use]
    pub fn with_value(kind: ActionType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
        }
    }

    /// Argument, or the empty string.
    #[must_use]
    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// A filter rule as authored, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFilterRule {
    /// Owning organization.
    pub org_id: OrgId,
    /// Identity scope; `None` applies organization-wide.
    pub identity_id: Option<IdentityId>,
    /// Display name.
    pub name: String,
    /// Higher runs first.
    pub priority: i64,
    /// Condition aggregation.
    pub combinator: Combinator,
    /// Conditions, in order.
    pub conditions: Vec<FilterCondition>,
    /// Actions, in order.
    pub actions: Vec<FilterAction>,
    /// Inactive rules are neither evaluated nor compiled.
    pub active: bool,
}

/// A stored filter rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    /// Unique identifier.
    pub id: RuleId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Identity scope; `None` applies organization-wide.
    pub identity_id: Option<IdentityId>,
    /// Display name.
    pub name: String,
    /// Higher runs first.
    pub priority: i64,
    /// Condition aggregation.
    pub combinator: Combinator,
    /// Conditions, in order.
    pub conditions: Vec<FilterCondition>,
    /// Actions, in order.
    pub actions: Vec<FilterAction>,
    /// Inactive rules are neither evaluated nor compiled.
    pub active: bool,
    /// Number of times the rule matched.
    pub match_count: i64,
    /// When the rule last matched.
    pub last_matched_at: Option<DateTime<Utc>>,
}
