use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{
    attachments, automation_rules, business_hours, companies, contacts, conversation_events,
    conversations, domains, mailboxes, messages, organizations, sla_policies,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = organizations)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = mailboxes)]
pub struct Mailbox {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = domains)]
pub struct EmailDomain {
    pub id: Uuid,
    pub org_id: Uuid,
    pub domain: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = contacts)]
pub struct Contact {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub company_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = companies)]
pub struct Company {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub contact_id: Uuid,
    pub company_id: Option<Uuid>,
    pub mailbox_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub subject: String,
    pub status: String,
    pub priority: String,
    pub channel: String,
    pub tags: Vec<String>,
    pub last_message_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub sla_first_response_due_at: Option<DateTime<Utc>>,
    pub sla_breached_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub org_id: Uuid,
    pub conversation_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub direction: String,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub headers: serde_json::Value,
    pub email_message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references_header: Option<String>,
    pub provider_email_id: Option<String>,
    pub resend_email_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = attachments)]
pub struct Attachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub filename: String,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_id: Option<String>,
    pub size_bytes: Option<i64>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = conversation_events)]
pub struct ConversationEvent {
    pub id: Uuid,
    pub org_id: Uuid,
    pub conversation_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = automation_rules)]
pub struct AutomationRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub trigger: String,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = sla_policies)]
pub struct SlaPolicy {
    pub id: Uuid,
    pub org_id: Uuid,
    pub priority: String,
    pub first_response_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = business_hours)]
pub struct BusinessHoursRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub is_enabled: bool,
    pub days: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
