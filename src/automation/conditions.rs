//! Condition trees evaluated over ticket facts.
//!
//! The persisted JSON is `{all: [...]}`, `{any: [...]}` or a leaf
//! `{fact, operator, value}`, deserialized into a closed tagged union. An
//! operator or fact the engine does not know fails at deserialization time
//! instead of silently never matching.

use serde::{Deserialize, Serialize};

use super::TicketFacts;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    All { all: Vec<ConditionNode> },
    Any { any: Vec<ConditionNode> },
    Leaf(Condition),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub fact: Fact,
    pub operator: Operator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Fact {
    MailboxEmail,
    SenderEmail,
    Subject,
    Channel,
    Priority,
    Status,
    Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equal,
    NotEqual,
    Contains,
    #[serde(alias = "doesNotContain")]
    NotContains,
    BeginsWith,
    EndsWith,
    ArrayContains,
    ArrayNotContains,
}

/// Fact value as seen by the evaluator: scalar text or a tag list.
#[derive(Debug, Clone, Copy)]
pub enum FactValue<'a> {
    Text(&'a str),
    List(&'a [String]),
}

/// Evaluate a tree. `all` is vacuously true when empty; `any` is false when
/// empty. String comparisons are case-sensitive.
pub fn evaluate(node: &ConditionNode, facts: &TicketFacts) -> bool {
    match node {
        ConditionNode::All { all } => all.iter().all(|child| evaluate(child, facts)),
        ConditionNode::Any { any } => any.iter().any(|child| evaluate(child, facts)),
        ConditionNode::Leaf(condition) => evaluate_leaf(condition, facts),
    }
}

fn evaluate_leaf(condition: &Condition, facts: &TicketFacts) -> bool {
    match facts.value(condition.fact) {
        FactValue::Text(actual) => match condition.operator {
            Operator::Equal => actual == condition.value,
            Operator::NotEqual => actual != condition.value,
            Operator::Contains => actual.contains(&condition.value),
            Operator::NotContains => !actual.contains(&condition.value),
            Operator::BeginsWith => actual.starts_with(&condition.value),
            Operator::EndsWith => actual.ends_with(&condition.value),
            // Array operators never match scalar facts.
            Operator::ArrayContains | Operator::ArrayNotContains => false,
        },
        FactValue::List(items) => match condition.operator {
            // Authored `contains`/`doesNotContain` on an array fact means
            // membership, same as the explicit array operators.
            Operator::Contains | Operator::ArrayContains => {
                items.iter().any(|item| item == &condition.value)
            }
            Operator::NotContains | Operator::ArrayNotContains => {
                !items.iter().any(|item| item == &condition.value)
            }
            Operator::Equal
            | Operator::NotEqual
            | Operator::BeginsWith
            | Operator::EndsWith => false,
        },
    }
}
