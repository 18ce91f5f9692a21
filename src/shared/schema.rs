diesel::table! {
    organizations (id) {
        id -> Uuid,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    mailboxes (id) {
        id -> Uuid,
        org_id -> Uuid,
        email -> Varchar,
        is_default -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    domains (id) {
        id -> Uuid,
        org_id -> Uuid,
        domain -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    contacts (id) {
        id -> Uuid,
        org_id -> Uuid,
        email -> Varchar,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        display_name -> Nullable<Varchar>,
        company_id -> Nullable<Uuid>,
        deleted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    companies (id) {
        id -> Uuid,
        org_id -> Uuid,
        name -> Varchar,
        domain -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    conversations (id) {
        id -> Uuid,
        org_id -> Uuid,
        contact_id -> Uuid,
        company_id -> Nullable<Uuid>,
        mailbox_id -> Nullable<Uuid>,
        assignee_id -> Nullable<Uuid>,
        subject -> Varchar,
        status -> Varchar,
        priority -> Varchar,
        channel -> Varchar,
        tags -> Array<Text>,
        last_message_at -> Timestamptz,
        first_response_at -> Nullable<Timestamptz>,
        sla_first_response_due_at -> Nullable<Timestamptz>,
        sla_breached_at -> Nullable<Timestamptz>,
        closed_at -> Nullable<Timestamptz>,
        deleted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    messages (id) {
        id -> Uuid,
        org_id -> Uuid,
        conversation_id -> Uuid,
        contact_id -> Nullable<Uuid>,
        direction -> Varchar,
        subject -> Nullable<Varchar>,
        text_body -> Nullable<Text>,
        html_body -> Nullable<Text>,
        headers -> Jsonb,
        email_message_id -> Nullable<Varchar>,
        in_reply_to -> Nullable<Varchar>,
        #[sql_name = "references"]
        references_header -> Nullable<Text>,
        provider_email_id -> Nullable<Varchar>,
        resend_email_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    attachments (id) {
        id -> Uuid,
        message_id -> Uuid,
        filename -> Varchar,
        content_type -> Nullable<Varchar>,
        content_disposition -> Nullable<Varchar>,
        content_id -> Nullable<Varchar>,
        size_bytes -> Nullable<Int8>,
        url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    conversation_events (id) {
        id -> Uuid,
        org_id -> Uuid,
        conversation_id -> Uuid,
        event_type -> Varchar,
        payload -> Jsonb,
        actor_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    automation_rules (id) {
        id -> Uuid,
        org_id -> Uuid,
        name -> Varchar,
        trigger -> Varchar,
        conditions -> Jsonb,
        actions -> Jsonb,
        is_active -> Bool,
        priority -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sla_policies (id) {
        id -> Uuid,
        org_id -> Uuid,
        priority -> Varchar,
        first_response_minutes -> Int4,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    business_hours (id) {
        id -> Uuid,
        org_id -> Uuid,
        is_enabled -> Bool,
        days -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(mailboxes -> organizations (org_id));
diesel::joinable!(domains -> organizations (org_id));
diesel::joinable!(contacts -> organizations (org_id));
diesel::joinable!(companies -> organizations (org_id));
diesel::joinable!(conversations -> organizations (org_id));
diesel::joinable!(conversations -> contacts (contact_id));
diesel::joinable!(messages -> conversations (conversation_id));
diesel::joinable!(attachments -> messages (message_id));
diesel::joinable!(conversation_events -> conversations (conversation_id));
diesel::joinable!(automation_rules -> organizations (org_id));
diesel::joinable!(sla_policies -> organizations (org_id));
diesel::joinable!(business_hours -> organizations (org_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    mailboxes,
    domains,
    contacts,
    companies,
    conversations,
    messages,
    attachments,
    conversation_events,
    automation_rules,
    sla_policies,
    business_hours,
);
