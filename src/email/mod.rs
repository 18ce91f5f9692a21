//! Inbound email ingestion.
//!
//! Webhook deliveries from the transactional email provider are turned into
//! help-desk conversations here: organization routing, contact resolution,
//! conversation threading and the atomic write of message, attachments and
//! audit events, followed by best-effort SLA and automation side effects.

pub mod content;
pub mod parser;
pub mod threading;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::automation::TicketFacts;
use crate::contacts::resolve_contact;
use crate::conversations::{self, log_event};
use crate::shared::enums::{
    AutomationTrigger, DomainStatus, EventKind, MessageDirection,
};
use crate::shared::models::{
    Attachment, Contact, Conversation, EmailDomain, Mailbox, Message, Organization,
};
use crate::shared::schema::{attachments, domains, mailboxes, messages, organizations};
use crate::shared::state::AppState;
use crate::{automation, sla};

use content::EmailContent;
use parser::{domain_of, parse_sender, HeaderMap};

pub const EVENT_EMAIL_RECEIVED: &str = "email.received";

#[derive(Debug, Clone, Deserialize)]
pub struct InboundEmailEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: Option<String>,
    pub data: InboundEmailData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundEmailData {
    pub email_id: String,
    pub created_at: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub attachments: Vec<InboundAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundAttachment {
    pub id: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("email content fetch failed: {0}")]
    ContentFetch(#[from] reqwest::Error),
}

#[derive(Debug)]
pub enum IngestOutcome {
    /// No organization owns any recipient; the delivery is logged and skipped.
    Dropped,
    Processed {
        conversation_id: Uuid,
        message_id: Uuid,
        conversation_created: bool,
    },
}

/// Map recipient addresses to the owning organization: exact mailbox match
/// first, then verified-domain match (which also picks up the org's default
/// mailbox for the conversation).
pub fn resolve_organization(
    conn: &mut PgConnection,
    to: &[String],
) -> QueryResult<Option<(Organization, Option<Mailbox>)>> {
    for address in to {
        let mailbox: Option<Mailbox> = mailboxes::table
            .filter(mailboxes::email.eq(address.trim().to_lowercase()))
            .first(conn)
            .optional()?;
        if let Some(mailbox) = mailbox {
            let org: Organization = organizations::table
                .filter(organizations::id.eq(mailbox.org_id))
                .first(conn)?;
            return Ok(Some((org, Some(mailbox))));
        }
    }

    for address in to {
        let Some(recipient_domain) = domain_of(address) else {
            continue;
        };
        let verified: Option<EmailDomain> = domains::table
            .filter(domains::domain.eq(&recipient_domain))
            .filter(domains::status.eq(DomainStatus::Verified.as_str()))
            .first(conn)
            .optional()?;
        if let Some(email_domain) = verified {
            let org: Organization = organizations::table
                .filter(organizations::id.eq(email_domain.org_id))
                .first(conn)?;
            let default_mailbox: Option<Mailbox> = mailboxes::table
                .filter(mailboxes::org_id.eq(email_domain.org_id))
                .filter(mailboxes::is_default.eq(true))
                .first(conn)
                .optional()?;
            return Ok(Some((org, default_mailbox)));
        }
    }

    Ok(None)
}

struct CommittedDelivery {
    conversation: Conversation,
    contact: Contact,
    message_id: Uuid,
    created: bool,
}

fn write_delivery(
    conn: &mut PgConnection,
    org: &Organization,
    mailbox: Option<&Mailbox>,
    data: &InboundEmailData,
    content: &EmailContent,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<CommittedDelivery, IngestError> {
    let sender = parse_sender(&data.from);
    let contact = resolve_contact(conn, org.id, &sender, now)?;

    let mut recipients: Vec<String> = Vec::new();
    recipients.extend(data.to.iter().cloned());
    recipients.extend(data.cc.iter().cloned());
    recipients.extend(data.bcc.iter().cloned());

    let in_reply_to = headers.get("in-reply-to").map(str::trim).filter(|v| !v.is_empty());
    let references = headers.get("references");

    let existing =
        threading::resolve_existing(conn, org.id, &recipients, in_reply_to, references)?;

    let (conversation, created) = match existing {
        Some(mut conversation) => {
            conversations::mark_replied(conn, &mut conversation, now)?;
            (conversation, false)
        }
        None => {
            let conversation = conversations::create_for_inbound_email(
                conn,
                org.id,
                &contact,
                mailbox.map(|m| m.id),
                data.subject.as_deref(),
                now,
            )?;
            (conversation, true)
        }
    };

    let email_message_id = data
        .message_id
        .as_deref()
        .or_else(|| headers.get("message-id"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let message = Message {
        id: Uuid::new_v4(),
        org_id: org.id,
        conversation_id: conversation.id,
        contact_id: Some(contact.id),
        direction: MessageDirection::Inbound.to_string(),
        subject: data.subject.clone(),
        text_body: content.text.clone(),
        html_body: content.html.clone(),
        headers: content
            .headers
            .as_ref()
            .map(|h| json!(h))
            .unwrap_or_else(|| json!({})),
        email_message_id,
        in_reply_to: in_reply_to.map(str::to_string),
        references_header: references.map(str::to_string),
        provider_email_id: Some(data.email_id.clone()),
        resend_email_id: None,
        created_at: now,
    };

    diesel::insert_into(messages::table)
        .values(&message)
        .execute(conn)?;

    for entry in &data.attachments {
        let attachment = Attachment {
            id: Uuid::new_v4(),
            message_id: message.id,
            filename: entry
                .filename
                .clone()
                .unwrap_or_else(|| "attachment".to_string()),
            content_type: entry.content_type.clone(),
            content_disposition: entry.content_disposition.clone(),
            content_id: entry.content_id.clone(),
            size_bytes: None,
            url: None,
            created_at: now,
        };
        diesel::insert_into(attachments::table)
            .values(&attachment)
            .execute(conn)?;
    }

    log_event(
        conn,
        org.id,
        conversation.id,
        EventKind::EmailReceived,
        json!({
            "message_id": message.id,
            "provider_email_id": data.email_id,
            "from": contact.email,
        }),
        None,
    )?;

    Ok(CommittedDelivery {
        conversation,
        contact,
        message_id: message.id,
        created,
    })
}

/// Process one webhook delivery end to end. Everything up to the commit is
/// fatal for the delivery (the provider retries); SLA and automation run
/// after the commit and only log their failures.
pub async fn process_inbound_email(
    state: &AppState,
    event: &InboundEmailEvent,
) -> Result<IngestOutcome, IngestError> {
    let mut conn = state.conn.get()?;

    let Some((org, mailbox)) = resolve_organization(&mut conn, &event.data.to)? else {
        info!(
            "No organization resolves for recipients {:?}; dropping email {}",
            event.data.to, event.data.email_id
        );
        return Ok(IngestOutcome::Dropped);
    };

    let email_content = state.content.fetch(&event.data.email_id).await?;
    let headers = email_content
        .headers
        .as_ref()
        .map(|h| HeaderMap::from_pairs(h.iter().map(|(k, v)| (k.as_str(), v.clone()))))
        .unwrap_or_default();

    let now = Utc::now();
    let committed = conn.transaction::<_, IngestError, _>(|conn| {
        write_delivery(
            conn,
            &org,
            mailbox.as_ref(),
            &event.data,
            &email_content,
            &headers,
            now,
        )
    })?;

    let conversation = &committed.conversation;
    if committed.created {
        if let Err(e) = sla::apply_first_response_sla(
            &mut conn,
            org.id,
            conversation.id,
            &conversation.priority,
            now,
        ) {
            error!(
                "SLA computation failed for org {} conversation {}: {e}",
                org.id, conversation.id
            );
        }
    }

    let trigger = if committed.created {
        AutomationTrigger::TicketCreated
    } else {
        AutomationTrigger::TicketReplied
    };
    let mut facts = TicketFacts::for_conversation(
        conversation,
        &committed.contact.email,
        mailbox.as_ref().map(|m| m.email.clone()),
    );
    if let Err(e) = automation::run_trigger(&mut conn, org.id, conversation.id, trigger, &mut facts)
    {
        error!(
            "Automation run failed for org {} conversation {}: {e}",
            org.id, conversation.id
        );
    }

    Ok(IngestOutcome::Processed {
        conversation_id: conversation.id,
        message_id: committed.message_id,
        conversation_created: committed.created,
    })
}

pub async fn receive_email_webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundEmailEvent>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if event.event_type != EVENT_EMAIL_RECEIVED {
        info!("Ignoring webhook event type {}", event.event_type);
        return Ok(Json(json!({ "status": "ignored" })));
    }

    match process_inbound_email(&state, &event).await {
        Ok(IngestOutcome::Dropped) => Ok(Json(json!({ "status": "dropped" }))),
        Ok(IngestOutcome::Processed {
            conversation_id,
            conversation_created,
            ..
        }) => Ok(Json(json!({
            "status": "processed",
            "conversation_id": conversation_id,
            "conversation_created": conversation_created,
        }))),
        Err(e) => {
            error!("Failed to process inbound email {}: {e}", event.data.email_id);
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Ingest error: {e}")))
        }
    }
}

pub fn configure_email_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/email", post(receive_email_webhook))
}
