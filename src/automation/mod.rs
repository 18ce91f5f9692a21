//! Rule-based ticket automation.
//!
//! Rules are evaluated per trigger, in ascending rule priority (creation time
//! breaks ties), each against the ticket's current facts. A malformed rule is
//! logged and skipped; nothing here rolls back the already-committed ticket.

pub mod actions;
pub mod conditions;

use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::conversations::log_event;
use crate::shared::enums::{AutomationTrigger, ConversationStatus, EventKind};
use crate::shared::models::{AutomationRule, Conversation};
use crate::shared::schema::{automation_rules, conversations};

use actions::{apply_action, AutomationAction};
use conditions::{evaluate, ConditionNode, Fact, FactValue};

/// Ticket facts exposed to the rule engine, doubling as the mutable state
/// actions are applied to.
#[derive(Debug, Clone)]
pub struct TicketFacts {
    pub mailbox_email: Option<String>,
    pub sender_email: String,
    pub subject: String,
    pub channel: String,
    pub priority: String,
    pub status: String,
    pub tags: Vec<String>,
    pub assignee_id: Option<Uuid>,
}

impl TicketFacts {
    pub fn for_conversation(
        conversation: &Conversation,
        sender_email: &str,
        mailbox_email: Option<String>,
    ) -> Self {
        Self {
            mailbox_email,
            sender_email: sender_email.to_string(),
            subject: conversation.subject.clone(),
            channel: conversation.channel.clone(),
            priority: conversation.priority.clone(),
            status: conversation.status.clone(),
            tags: conversation.tags.clone(),
            assignee_id: conversation.assignee_id,
        }
    }

    pub(crate) fn value(&self, fact: Fact) -> FactValue<'_> {
        match fact {
            Fact::MailboxEmail => FactValue::Text(self.mailbox_email.as_deref().unwrap_or("")),
            Fact::SenderEmail => FactValue::Text(&self.sender_email),
            Fact::Subject => FactValue::Text(&self.subject),
            Fact::Channel => FactValue::Text(&self.channel),
            Fact::Priority => FactValue::Text(&self.priority),
            Fact::Status => FactValue::Text(&self.status),
            Fact::Tags => FactValue::List(&self.tags),
        }
    }
}

fn parse_rule(rule: &AutomationRule) -> Option<(ConditionNode, Vec<AutomationAction>)> {
    let tree = match serde_json::from_value::<ConditionNode>(rule.conditions.clone()) {
        Ok(tree) => tree,
        Err(e) => {
            warn!("Rule {} has an invalid condition tree: {e}", rule.id);
            return None;
        }
    };
    let actions = match serde_json::from_value::<Vec<AutomationAction>>(rule.actions.clone()) {
        Ok(actions) => actions,
        Err(e) => {
            warn!("Rule {} has an invalid action list: {e}", rule.id);
            return None;
        }
    };
    Some((tree, actions))
}

/// Evaluate and apply all active rules for `trigger`, then persist the
/// accumulated ticket state once. Returns the ids of the rules that fired.
pub fn run_trigger(
    conn: &mut PgConnection,
    org: Uuid,
    conversation_id: Uuid,
    trigger: AutomationTrigger,
    facts: &mut TicketFacts,
) -> QueryResult<Vec<Uuid>> {
    let rules: Vec<AutomationRule> = automation_rules::table
        .filter(automation_rules::org_id.eq(org))
        .filter(automation_rules::trigger.eq(trigger.as_str()))
        .filter(automation_rules::is_active.eq(true))
        .order((
            automation_rules::priority.asc(),
            automation_rules::created_at.asc(),
        ))
        .load(conn)?;

    let mut fired = Vec::new();
    for rule in &rules {
        let Some((tree, rule_actions)) = parse_rule(rule) else {
            continue;
        };
        if !evaluate(&tree, facts) {
            continue;
        }
        for action in &rule_actions {
            apply_action(facts, action);
        }
        fired.push(rule.id);
        info!("Automation rule {} ({}) fired for conversation {}", rule.id, rule.name, conversation_id);
    }

    if fired.is_empty() {
        return Ok(fired);
    }

    let now = Utc::now();
    let closed_at = if facts.status == ConversationStatus::Closed.to_string() {
        Some(now)
    } else {
        None
    };

    diesel::update(conversations::table.filter(conversations::id.eq(conversation_id)))
        .set((
            conversations::tags.eq(&facts.tags),
            conversations::priority.eq(&facts.priority),
            conversations::status.eq(&facts.status),
            conversations::assignee_id.eq(facts.assignee_id),
            conversations::closed_at.eq(closed_at),
            conversations::updated_at.eq(now),
        ))
        .execute(conn)?;

    for rule in rules.iter().filter(|r| fired.contains(&r.id)) {
        log_event(
            conn,
            org,
            conversation_id,
            EventKind::AutomationExecuted,
            json!({ "rule_id": rule.id, "rule_name": rule.name, "trigger": trigger }),
            None,
        )?;
    }

    Ok(fired)
}
