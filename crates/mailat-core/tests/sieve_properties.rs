//! Property tests for Sieve generation and validation.

#![allow(clippy::unwrap_used)]

use mailat_core::filter::{
    ActionType, Combinator, ConditionField, FilterAction, FilterCondition, FilterRule, Operator,
    RuleId,
};
use mailat_core::identity::OrgId;
use mailat_core::sieve::{self, HEADER, SieveScript};
use proptest::prelude::*;

// Printable ASCII without braces: the validator counts braces even inside
// quoted strings.
const TEXT: &str = "[ -z|~]{0,24}";

fn field() -> impl Strategy<Value = ConditionField> {
    prop_oneof![
        Just(ConditionField::From),
        Just(ConditionField::To),
        Just(ConditionField::Subject),
        Just(ConditionField::Body),
        Just(ConditionField::HasAttachment),
        Just(ConditionField::Other),
    ]
}

fn operator() -> impl Strategy<Value = Operator> {
    prop_oneof![
        Just(Operator::Contains),
        Just(Operator::Equals),
        Just(Operator::StartsWith),
        Just(Operator::EndsWith),
        Just(Operator::Regex),
        Just(Operator::Other),
    ]
}

fn action_type() -> impl Strategy<Value = ActionType> {
    prop_oneof![
        Just(ActionType::MoveToFolder),
        Just(ActionType::Star),
        Just(ActionType::MarkRead),
        Just(ActionType::Archive),
        Just(ActionType::Trash),
        Just(ActionType::Forward),
        Just(ActionType::Reject),
        Just(ActionType::StopProcessing),
        Just(ActionType::Other),
    ]
}

fn condition() -> impl Strategy<Value = FilterCondition> {
    (field(), operator(), TEXT).prop_map(|(f, o, v)| FilterCondition::new(f, o, v))
}

fn action() -> impl Strategy<Value = FilterAction> {
    (action_type(), proptest::option::of(TEXT)).prop_map(|(kind, value)| FilterAction { kind, value })
}

fn rule() -> impl Strategy<Value = FilterRule> {
    (
        "[ -z|~\r\n]{0,24}",
        any::<bool>(),
        any::<bool>(),
        proptest::collection::vec(condition(), 0..4),
        proptest::collection::vec(action(), 0..4),
    )
        .prop_map(|(name, any_of, active, conditions, actions)| FilterRule {
            id: RuleId::new(1),
            org_id: OrgId::new(1),
            identity_id: None,
            name,
            priority: 0,
            combinator: if any_of {
                Combinator::Any
            } else {
                Combinator::All
            },
            conditions,
            actions,
            active,
            match_count: 0,
            last_matched_at: None,
        })
}

proptest! {
    #[test]
    fn generated_scripts_validate(rules in proptest::collection::vec(rule(), 0..6)) {
        let script = sieve::generate(&rules);
        prop_assert!(script.starts_with(HEADER));
        prop_assert_eq!(sieve::validate(&script), Ok(()));
    }

    #[test]
    fn generated_scripts_can_be_activated(rules in proptest::collection::vec(rule(), 0..4)) {
        let mut script = SieveScript::new("rules", sieve::generate(&rules), false);
        prop_assert!(script.is_valid());
        prop_assert!(script.set_active(true).is_ok());
        prop_assert!(script.is_active());
    }

    #[test]
    fn inactive_rules_leave_only_the_header(mut rules in proptest::collection::vec(rule(), 0..6)) {
        for rule in &mut rules {
            rule.active = false;
        }
        prop_assert_eq!(sieve::generate(&rules), HEADER);
    }

    #[test]
    fn validation_is_deterministic(script in "[ -~\n]{0,200}") {
        prop_assert_eq!(sieve::validate(&script), sieve::validate(&script));
    }

    #[test]
    fn extra_closing_brace_is_rejected(rules in proptest::collection::vec(rule(), 0..4)) {
        let script = format!("{}}}\n", sieve::generate(&rules));
        prop_assert!(sieve::validate(&script).is_err());
    }
}
