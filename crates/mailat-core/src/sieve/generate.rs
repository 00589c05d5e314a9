//! Compile filter rules into an equivalent Sieve script.

use std::fmt::Write as _;

use tracing::debug;

use crate::filter::{ActionType, ConditionField, FilterAction, FilterCondition, FilterRule, Operator};

/// Leading comment and capability list of every generated script.
pub const HEADER: &str = "# Auto-generated Sieve script from email rules\n\
                          require [\"fileinto\", \"imap4flags\", \"reject\", \"vacation\", \"copy\"];\n\n";

/// Escape a literal for a Sieve quoted string: backslashes, then quotes.
#[must_use]
pub fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Map a condition to a Sieve test, or `None` when it has no equivalent.
#[must_use]
pub fn condition_test(condition: &FilterCondition) -> Option<String> {
    let value = escape(&condition.value);
    let header = match condition.field {
        ConditionField::From => "From",
        ConditionField::To => "To",
        ConditionField::Subject => "Subject",
        ConditionField::Body => return Some(format!("body :contains \"{value}\"")),
        ConditionField::HasAttachment | ConditionField::Other => return None,
    };

    match condition.operator {
        Operator::Contains => Some(format!("header :contains \"{header}\" \"{value}\"")),
        Operator::Equals => Some(format!("header :is \"{header}\" \"{value}\"")),
        Operator::StartsWith => Some(format!("header :matches \"{header}\" \"{value}*\"")),
        Operator::EndsWith => Some(format!("header :matches \"{header}\" \"*{value}\"")),
        Operator::Regex | Operator::Other => None,
    }
}

/// Map an action to a Sieve command, or `None` when it has no equivalent.
#[must_use]
pub fn action_command(action: &FilterAction) -> Option<String> {
    let value = escape(action.value_or_empty());
    match action.kind {
        ActionType::MoveToFolder => Some(format!("fileinto \"{value}\";")),
        ActionType::Star => Some("addflag \"\\\\Flagged\";".to_string()),
        ActionType::MarkRead => Some("addflag \"\\\\Seen\";".to_string()),
        ActionType::Trash => Some("discard;".to_string()),
        ActionType::Forward => Some(format!("redirect :copy \"{value}\";")),
        ActionType::Reject => Some(format!("reject \"{value}\";")),
        ActionType::StopProcessing => Some("stop;".to_string()),
        ActionType::Archive | ActionType::Other => None,
    }
}

/// Generate a script from rules, in the order given.
///
/// Inactive rules are left out, as are rules none of whose conditions map
/// to a Sieve test. Unmapped conditions and actions are dropped silently.
#[must_use]
pub fn generate(rules: &[FilterRule]) -> String {
    let mut out = String::from(HEADER);

    for rule in rules.iter().filter(|r| r.active) {
        let tests: Vec<String> = rule.conditions.iter().filter_map(condition_test).collect();
        if tests.is_empty() {
            debug!("Rule {} has no Sieve-expressible condition, skipping", rule.id);
            continue;
        }

        // A line break in the name would end the comment early.
        let name = rule.name.replace(['\r', '\n'], " ");
        let _ = writeln!(out, "# Rule: {name}");

        if let [test] = tests.as_slice() {
            let _ = writeln!(out, "if {test} {{");
        } else {
            let _ = writeln!(
                out,
                "if {} ({}) {{",
                rule.combinator.sieve_test(),
                tests.join(", ")
            );
        }

        for command in rule.actions.iter().filter_map(action_command) {
            let _ = writeln!(out, "    {command}");
        }
        out.push_str("}\n\n");
    }

    out
}
