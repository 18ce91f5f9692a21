//! Automation actions applied to a matched ticket.
//!
//! Actions mutate the in-memory ticket state sequentially, so a later action
//! in the same rule (and a later rule in the same run) observes earlier
//! effects. Persistence happens once per run, after all rules fired.

use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::enums::{ConversationStatus, Priority};

use super::TicketFacts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddTag,
    RemoveTag,
    SetPriority,
    SetStatus,
    AssignTo,
}

/// Apply a single action. Invalid literals (unknown priority/status, bad
/// user id) are logged and skipped; they never abort the run.
pub fn apply_action(facts: &mut TicketFacts, action: &AutomationAction) {
    match action.kind {
        ActionKind::AddTag => {
            if !facts.tags.iter().any(|t| t == &action.value) {
                facts.tags.push(action.value.clone());
            }
        }
        ActionKind::RemoveTag => {
            facts.tags.retain(|t| t != &action.value);
        }
        ActionKind::SetPriority => match action.value.parse::<Priority>() {
            Ok(priority) => facts.priority = priority.to_string(),
            Err(e) => warn!("Skipping set_priority action: {e}"),
        },
        ActionKind::SetStatus => match action.value.parse::<ConversationStatus>() {
            Ok(status) => facts.status = status.to_string(),
            Err(e) => warn!("Skipping set_status action: {e}"),
        },
        ActionKind::AssignTo => match Uuid::parse_str(&action.value) {
            Ok(user_id) => facts.assignee_id = Some(user_id),
            Err(e) => warn!("Skipping assign_to action with value {:?}: {e}", action.value),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> TicketFacts {
        TicketFacts {
            mailbox_email: None,
            sender_email: "jane@external.com".to_string(),
            subject: "Help".to_string(),
            channel: "email".to_string(),
            priority: "normal".to_string(),
            status: "open".to_string(),
            tags: vec![],
            assignee_id: None,
        }
    }

    fn action(kind: ActionKind, value: &str) -> AutomationAction {
        AutomationAction {
            kind,
            value: value.to_string(),
        }
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut f = facts();
        apply_action(&mut f, &action(ActionKind::AddTag, "vip"));
        apply_action(&mut f, &action(ActionKind::AddTag, "vip"));
        assert_eq!(f.tags, vec!["vip"]);
    }

    #[test]
    fn remove_tag_after_add_observes_earlier_effect() {
        let mut f = facts();
        apply_action(&mut f, &action(ActionKind::AddTag, "triage"));
        apply_action(&mut f, &action(ActionKind::RemoveTag, "triage"));
        assert!(f.tags.is_empty());
    }

    #[test]
    fn set_priority_validates_literal() {
        let mut f = facts();
        apply_action(&mut f, &action(ActionKind::SetPriority, "urgent"));
        assert_eq!(f.priority, "urgent");
        apply_action(&mut f, &action(ActionKind::SetPriority, "sev1"));
        assert_eq!(f.priority, "urgent");
    }

    #[test]
    fn assign_to_parses_user_id() {
        let mut f = facts();
        let id = Uuid::new_v4();
        apply_action(&mut f, &action(ActionKind::AssignTo, &id.to_string()));
        assert_eq!(f.assignee_id, Some(id));
        apply_action(&mut f, &action(ActionKind::AssignTo, "nobody"));
        assert_eq!(f.assignee_id, Some(id));
    }

    #[test]
    fn action_list_json_shape() {
        let raw = serde_json::json!([
            { "type": "add_tag", "value": "billing" },
            { "type": "set_status", "value": "pending" }
        ]);
        let actions: Vec<AutomationAction> = serde_json::from_value(raw).unwrap();
        assert_eq!(actions[0].kind, ActionKind::AddTag);
        assert_eq!(actions[1].kind, ActionKind::SetStatus);
    }
}
