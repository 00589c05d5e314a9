//! Per-organization filter rules and their evaluation.

mod evaluator;
mod model;
mod repository;

pub use evaluator::{Evaluator, action_change, condition_matches, matches};
pub use model::{
    ActionType, Combinator, ConditionField, FilterAction, FilterCondition, FilterRule,
    NewFilterRule, Operator, RuleId,
};
pub use repository::FilterRepository;
