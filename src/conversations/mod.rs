//! Conversation rows and their append-only event trail.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::shared::enums::{Channel, ConversationStatus, EventKind, Priority};
use crate::shared::models::{Contact, Conversation, ConversationEvent};
use crate::shared::schema::{conversation_events, conversations};

pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// Append one audit event. Events are never updated or deleted.
pub fn log_event(
    conn: &mut PgConnection,
    org: Uuid,
    conversation_id: Uuid,
    kind: EventKind,
    payload: serde_json::Value,
    actor_id: Option<Uuid>,
) -> QueryResult<()> {
    let event = ConversationEvent {
        id: Uuid::new_v4(),
        org_id: org,
        conversation_id,
        event_type: kind.to_string(),
        payload,
        actor_id,
        created_at: Utc::now(),
    };

    diesel::insert_into(conversation_events::table)
        .values(&event)
        .execute(conn)?;
    Ok(())
}

/// Create a fresh conversation for an inbound email and emit
/// `conversation_created`.
pub fn create_for_inbound_email(
    conn: &mut PgConnection,
    org: Uuid,
    contact: &Contact,
    mailbox_id: Option<Uuid>,
    subject: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<Conversation> {
    let subject = subject
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUBJECT);

    let conversation = Conversation {
        id: Uuid::new_v4(),
        org_id: org,
        contact_id: contact.id,
        company_id: contact.company_id,
        mailbox_id,
        assignee_id: None,
        subject: subject.to_string(),
        status: ConversationStatus::Open.to_string(),
        priority: Priority::Normal.to_string(),
        channel: Channel::Email.to_string(),
        tags: Vec::new(),
        last_message_at: now,
        first_response_at: None,
        sla_first_response_due_at: None,
        sla_breached_at: None,
        closed_at: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(conversations::table)
        .values(&conversation)
        .execute(conn)?;

    log_event(
        conn,
        org,
        conversation.id,
        EventKind::ConversationCreated,
        json!({ "subject": conversation.subject, "contact_id": contact.id }),
        None,
    )?;

    Ok(conversation)
}

/// A genuine threaded reply arrived: force the conversation back open,
/// refresh freshness and clear any soft delete.
pub fn mark_replied(
    conn: &mut PgConnection,
    conversation: &mut Conversation,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    diesel::update(conversations::table.filter(conversations::id.eq(conversation.id)))
        .set((
            conversations::status.eq(ConversationStatus::Open.to_string()),
            conversations::last_message_at.eq(now),
            conversations::deleted_at.eq(None::<DateTime<Utc>>),
            conversations::updated_at.eq(now),
        ))
        .execute(conn)?;

    conversation.status = ConversationStatus::Open.to_string();
    conversation.last_message_at = now;
    conversation.deleted_at = None;
    conversation.updated_at = now;
    Ok(())
}
