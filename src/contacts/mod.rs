//! Contact and company resolution for inbound email.
//!
//! Finds or creates the Contact for `(org, sender email)`, restoring
//! soft-deleted rows, and auto-associates a Company from the sender's domain
//! unless the domain belongs to a free mail provider.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::email::parser::{domain_of, local_part_of, ParsedSender};
use crate::shared::models::{Company, Contact};
use crate::shared::schema::{companies, contacts};
use crate::shared::utils::capitalize;

/// Explicit denylist; domains here never produce an auto-created Company.
pub static FREE_EMAIL_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "gmail.com",
        "googlemail.com",
        "yahoo.com",
        "yahoo.co.uk",
        "outlook.com",
        "hotmail.com",
        "live.com",
        "msn.com",
        "icloud.com",
        "me.com",
        "aol.com",
        "proton.me",
        "protonmail.com",
        "gmx.com",
        "gmx.de",
        "mail.com",
        "zoho.com",
        "yandex.com",
    ])
});

/// Derive a `(first_name, last_name)` pair. A display name splits on the
/// first space; otherwise the email local part splits on `.`, `_` and `-`
/// with each token capitalized.
pub fn derive_name(display_name: Option<&str>, email: &str) -> (String, String) {
    if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
        return match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (name.to_string(), String::new()),
        };
    }

    let tokens: Vec<String> = local_part_of(email)
        .split(['.', '_', '-'])
        .filter(|t| !t.is_empty())
        .map(capitalize)
        .collect();

    match tokens.split_first() {
        Some((first, rest)) => (first.clone(), rest.join(" ")),
        None => (String::new(), String::new()),
    }
}

/// Company name from a domain: capitalize the first label (`acme.com` -> `Acme`).
pub fn company_name_for_domain(domain: &str) -> String {
    capitalize(domain.split('.').next().unwrap_or(domain))
}

/// Find or create a Company for the sender's domain. Returns None when the
/// domain is missing or on the free-mail denylist.
pub fn find_or_create_company(
    conn: &mut PgConnection,
    org: Uuid,
    sender_email: &str,
    now: DateTime<Utc>,
) -> QueryResult<Option<Company>> {
    let Some(sender_domain) = domain_of(sender_email) else {
        return Ok(None);
    };
    if FREE_EMAIL_DOMAINS.contains(sender_domain.as_str()) {
        return Ok(None);
    }

    let existing: Option<Company> = companies::table
        .filter(companies::org_id.eq(org))
        .filter(companies::domain.eq(&sender_domain))
        .first(conn)
        .optional()?;

    if let Some(company) = existing {
        return Ok(Some(company));
    }

    let company = Company {
        id: Uuid::new_v4(),
        org_id: org,
        name: company_name_for_domain(&sender_domain),
        domain: sender_domain,
        created_at: now,
    };

    diesel::insert_into(companies::table)
        .values(&company)
        .execute(conn)?;

    info!("Auto-created company {} for domain {}", company.name, company.domain);
    Ok(Some(company))
}

/// Find or create the Contact for `(org, sender email)`. Soft-deleted
/// contacts are restored; the unique constraint on `(org_id, email)` backstops
/// concurrent inserts inside the enclosing transaction.
pub fn resolve_contact(
    conn: &mut PgConnection,
    org: Uuid,
    sender: &ParsedSender,
    now: DateTime<Utc>,
) -> QueryResult<Contact> {
    let email = sender.email.to_lowercase();

    let existing: Option<Contact> = contacts::table
        .filter(contacts::org_id.eq(org))
        .filter(contacts::email.eq(&email))
        .first(conn)
        .optional()?;

    if let Some(mut contact) = existing {
        if contact.deleted_at.is_some() {
            diesel::update(contacts::table.filter(contacts::id.eq(contact.id)))
                .set((
                    contacts::deleted_at.eq(None::<DateTime<Utc>>),
                    contacts::updated_at.eq(now),
                ))
                .execute(conn)?;
            contact.deleted_at = None;
            contact.updated_at = now;
            info!("Restored soft-deleted contact {}", contact.id);
        }
        return Ok(contact);
    }

    let (first_name, last_name) = derive_name(sender.display_name.as_deref(), &email);
    let company = find_or_create_company(conn, org, &email, now)?;

    let display_name = sender.display_name.clone().or_else(|| {
        let joined = format!("{first_name} {last_name}");
        let joined = joined.trim().to_string();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    });

    let contact = Contact {
        id: Uuid::new_v4(),
        org_id: org,
        email,
        first_name: Some(first_name).filter(|s| !s.is_empty()),
        last_name: Some(last_name).filter(|s| !s.is_empty()),
        display_name,
        company_id: company.map(|c| c.id),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(contacts::table)
        .values(&contact)
        .execute(conn)?;

    Ok(contact)
}
