//! Conversation threading resolver.
//!
//! Maps an inbound email to exactly one existing conversation through an
//! ordered cascade of lookups; the first hit wins. Subject-text matching is
//! deliberately absent: generic subjects ("Hi", "Help") used to merge
//! unrelated emails into the wrong thread. Only plus-address and
//! Message-ID-derived signals are trusted.

use diesel::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::shared::enums::MessageDirection;
use crate::shared::models::Conversation;
use crate::shared::schema::{conversations, messages};

/// Matches the system's own plus-addressed reply-to pattern,
/// e.g. `support+conv_6f9619ff-...@acme.com`.
static PLUS_CONV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\+conv_([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})@",
    )
    .expect("plus-address pattern is valid")
});

/// Lookup seam for the cascade. Production goes through Postgres; the
/// cascade itself stays independently testable against an in-memory index.
pub trait ConversationIndex {
    fn conversation_by_id(&mut self, id: Uuid) -> QueryResult<Option<Conversation>>;
    fn conversation_of_message_ids(&mut self, ids: &[String])
        -> QueryResult<Option<Conversation>>;
    fn conversation_of_send_ids(&mut self, send_ids: &[String])
        -> QueryResult<Option<Conversation>>;
}

pub struct PgConversationIndex<'a> {
    pub conn: &'a mut PgConnection,
    pub org: Uuid,
}

impl ConversationIndex for PgConversationIndex<'_> {
    fn conversation_by_id(&mut self, id: Uuid) -> QueryResult<Option<Conversation>> {
        conversations::table
            .filter(conversations::org_id.eq(self.org))
            .filter(conversations::id.eq(id))
            .first(self.conn)
            .optional()
    }

    fn conversation_of_message_ids(
        &mut self,
        ids: &[String],
    ) -> QueryResult<Option<Conversation>> {
        if ids.is_empty() {
            return Ok(None);
        }
        let conversation_id: Option<Uuid> = messages::table
            .filter(messages::org_id.eq(self.org))
            .filter(messages::email_message_id.eq_any(ids))
            .select(messages::conversation_id)
            .first(self.conn)
            .optional()?;
        match conversation_id {
            Some(id) => self.conversation_by_id(id),
            None => Ok(None),
        }
    }

    fn conversation_of_send_ids(
        &mut self,
        send_ids: &[String],
    ) -> QueryResult<Option<Conversation>> {
        if send_ids.is_empty() {
            return Ok(None);
        }
        let conversation_id: Option<Uuid> = messages::table
            .filter(messages::org_id.eq(self.org))
            .filter(messages::direction.eq(MessageDirection::Outbound.as_str()))
            .filter(messages::resend_email_id.eq_any(send_ids))
            .select(messages::conversation_id)
            .first(self.conn)
            .optional()?;
        match conversation_id {
            Some(id) => self.conversation_by_id(id),
            None => Ok(None),
        }
    }
}

/// Every conversation id embedded in the recipient list, in recipient order,
/// deduplicated. All candidates are kept; one stale plus-address must not
/// mask a later recipient that still resolves.
pub fn conversation_ids_from_recipients<'a, I>(recipients: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids = Vec::new();
    for address in recipients {
        if let Some(id) = PLUS_CONV_RE
            .captures(address)
            .and_then(|caps| Uuid::parse_str(&caps[1]).ok())
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Split a References header into individual Message-ID tokens.
pub fn split_references(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Local part of a Message-ID token: `<local@domain>` -> `local`. Providers
/// that rewrite Message-IDs on send keep their own send id in the local part,
/// which is what the send-id correlation strategy matches against.
pub fn message_id_local_part(token: &str) -> Option<String> {
    let trimmed = token.trim().trim_start_matches('<').trim_end_matches('>');
    let local = trimmed.split('@').next().unwrap_or(trimmed);
    if local.is_empty() {
        None
    } else {
        Some(local.to_string())
    }
}

/// Run the cascade against an existing thread. Returns the conversation even
/// when it is closed or soft-deleted; the caller resurrects it.
///
/// Order: plus-addressed recipients, In-Reply-To, References, provider
/// send-id correlation.
pub fn resolve_with<I: ConversationIndex>(
    index: &mut I,
    recipients: &[String],
    in_reply_to: Option<&str>,
    references: Option<&str>,
) -> QueryResult<Option<Conversation>> {
    for id in conversation_ids_from_recipients(recipients.iter().map(String::as_str)) {
        if let Some(conversation) = index.conversation_by_id(id)? {
            return Ok(Some(conversation));
        }
    }

    if let Some(value) = in_reply_to.map(str::trim).filter(|v| !v.is_empty()) {
        if let Some(conversation) =
            index.conversation_of_message_ids(&[value.to_string()])?
        {
            return Ok(Some(conversation));
        }
    }

    let reference_ids = references.map(split_references).unwrap_or_default();
    if let Some(conversation) = index.conversation_of_message_ids(&reference_ids)? {
        return Ok(Some(conversation));
    }

    let mut tokens: Vec<String> = reference_ids;
    if let Some(value) = in_reply_to.map(str::trim).filter(|v| !v.is_empty()) {
        tokens.push(value.to_string());
    }
    let send_ids: Vec<String> = tokens
        .iter()
        .filter_map(|t| message_id_local_part(t))
        .collect();
    index.conversation_of_send_ids(&send_ids)
}

pub fn resolve_existing(
    conn: &mut PgConnection,
    org: Uuid,
    recipients: &[String],
    in_reply_to: Option<&str>,
    references: Option<&str>,
) -> QueryResult<Option<Conversation>> {
    let mut index = PgConversationIndex { conn, org };
    resolve_with(&mut index, recipients, in_reply_to, references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn conversation(id: Uuid) -> Conversation {
        let now = Utc::now();
        Conversation {
            id,
            org_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            company_id: None,
            mailbox_id: None,
            assignee_id: None,
            subject: "Help".to_string(),
            status: "open".to_string(),
            priority: "normal".to_string(),
            channel: "email".to_string(),
            tags: vec![],
            last_message_at: now,
            first_response_at: None,
            sla_first_response_due_at: None,
            sla_breached_at: None,
            closed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        conversations: HashMap<Uuid, Conversation>,
        by_message_id: HashMap<String, Uuid>,
        by_send_id: HashMap<String, Uuid>,
    }

    impl FakeIndex {
        fn add_conversation(&mut self) -> Uuid {
            let id = Uuid::new_v4();
            self.conversations.insert(id, conversation(id));
            id
        }

        fn add_message(&mut self, conversation_id: Uuid, email_message_id: &str) {
            self.by_message_id
                .insert(email_message_id.to_string(), conversation_id);
        }

        fn add_outbound_send(&mut self, conversation_id: Uuid, send_id: &str) {
            self.by_send_id.insert(send_id.to_string(), conversation_id);
        }
    }

    impl ConversationIndex for FakeIndex {
        fn conversation_by_id(&mut self, id: Uuid) -> QueryResult<Option<Conversation>> {
            Ok(self.conversations.get(&id).cloned())
        }

        fn conversation_of_message_ids(
            &mut self,
            ids: &[String],
        ) -> QueryResult<Option<Conversation>> {
            for id in ids {
                if let Some(conversation_id) = self.by_message_id.get(id) {
                    return Ok(self.conversations.get(conversation_id).cloned());
                }
            }
            Ok(None)
        }

        fn conversation_of_send_ids(
            &mut self,
            send_ids: &[String],
        ) -> QueryResult<Option<Conversation>> {
            for id in send_ids {
                if let Some(conversation_id) = self.by_send_id.get(id) {
                    return Ok(self.conversations.get(conversation_id).cloned());
                }
            }
            Ok(None)
        }
    }

    fn plus_address(conversation_id: Uuid) -> String {
        format!("support+conv_{conversation_id}@acme.com")
    }

    #[test]
    fn finds_plus_addressed_conversation_ids() {
        let id = "6f9619ff-8b86-4d01-b42d-00cf4fc964ff";
        let recipients = [
            "random@elsewhere.com".to_string(),
            format!("support+conv_{id}@acme.com"),
        ];
        let found =
            conversation_ids_from_recipients(recipients.iter().map(String::as_str));
        assert_eq!(found, vec![Uuid::parse_str(id).unwrap()]);
    }

    #[test]
    fn plus_address_match_is_case_insensitive() {
        let id = "6F9619FF-8B86-4D01-B42D-00CF4FC964FF";
        let recipient = format!("SUPPORT+CONV_{id}@ACME.COM");
        assert_eq!(
            conversation_ids_from_recipients([recipient.as_str()]).len(),
            1
        );
    }

    #[test]
    fn ignores_unrelated_plus_addresses() {
        assert!(conversation_ids_from_recipients(["support+billing@acme.com"]).is_empty());
        assert!(
            conversation_ids_from_recipients(["support+conv_not-a-uuid@acme.com"]).is_empty()
        );
    }

    #[test]
    fn collects_every_plus_addressed_candidate() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let recipients = [plus_address(a), plus_address(b), plus_address(a)];
        let found =
            conversation_ids_from_recipients(recipients.iter().map(String::as_str));
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn splits_references_on_whitespace() {
        let refs = split_references("<a@x>  <b@y>\n\t<c@z>");
        assert_eq!(refs, vec!["<a@x>", "<b@y>", "<c@z>"]);
        assert!(split_references("").is_empty());
    }

    #[test]
    fn extracts_message_id_local_parts() {
        assert_eq!(
            message_id_local_part("<re_abc123@mail.resend.com>").as_deref(),
            Some("re_abc123")
        );
        assert_eq!(message_id_local_part("plain@domain").as_deref(), Some("plain"));
        assert_eq!(message_id_local_part("<>"), None);
    }

    #[test]
    fn plus_address_wins_over_reply_headers() {
        let mut index = FakeIndex::default();
        let plus_target = index.add_conversation();
        let header_target = index.add_conversation();
        index.add_message(header_target, "<orig@ext>");

        let recipients = vec![plus_address(plus_target)];
        let found = resolve_with(&mut index, &recipients, Some("<orig@ext>"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, plus_target);
    }

    #[test]
    fn stale_plus_address_does_not_mask_later_recipient() {
        let mut index = FakeIndex::default();
        let target = index.add_conversation();
        // First recipient carries an id that no longer resolves.
        let recipients = vec![plus_address(Uuid::new_v4()), plus_address(target)];
        let found = resolve_with(&mut index, &recipients, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, target);
    }

    #[test]
    fn in_reply_to_attaches_to_matched_message_conversation() {
        let mut index = FakeIndex::default();
        let target = index.add_conversation();
        let other = index.add_conversation();
        index.add_message(target, "<orig@ext>");
        index.add_message(other, "<unrelated@ext>");

        let found = resolve_with(&mut index, &[], Some("<orig@ext>"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, target);
    }

    #[test]
    fn references_used_when_in_reply_to_is_unknown() {
        let mut index = FakeIndex::default();
        let target = index.add_conversation();
        index.add_message(target, "<second@ext>");

        let found = resolve_with(
            &mut index,
            &[],
            Some("<never-seen@ext>"),
            Some("<first@ext> <second@ext>"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.id, target);
    }

    #[test]
    fn send_id_correlation_is_the_last_resort() {
        let mut index = FakeIndex::default();
        let target = index.add_conversation();
        // The provider rewrote the outbound Message-ID; only the send id in
        // the local part survives.
        index.add_outbound_send(target, "re_abc123");

        let found = resolve_with(
            &mut index,
            &[],
            Some("<re_abc123@mail.resend.com>"),
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.id, target);
    }

    #[test]
    fn no_signal_resolves_to_nothing() {
        let mut index = FakeIndex::default();
        index.add_conversation();
        let found = resolve_with(
            &mut index,
            &["someone@elsewhere.com".to_string()],
            Some("<unknown@ext>"),
            Some("<also-unknown@ext>"),
        )
        .unwrap();
        assert!(found.is_none());
    }
}
