//! Header and address parsing for inbound email events.
//!
//! Pure functions only; no database access. Header lookups go through a
//! case-insensitive map so callers never have to probe `Message-Id`,
//! `message-id` and `Message-ID` by hand.

use std::collections::HashMap;

/// Case-insensitive view over raw email headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: HashMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sender extracted from an RFC 5322 "From" value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSender {
    pub email: String,
    pub display_name: Option<String>,
}

/// Parse `"Jane Doe" <jane@example.com>` or a bare address. The email is
/// lowercased; the display name keeps its original casing with quotes and
/// surrounding whitespace stripped.
pub fn parse_sender(from: &str) -> ParsedSender {
    if let Some(start) = from.find('<') {
        if let Some(end) = from.rfind('>') {
            if end > start {
                let name = from[..start].trim().trim_matches('"').trim();
                let email = from[start + 1..end].trim().to_lowercase();
                return ParsedSender {
                    email,
                    display_name: if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    },
                };
            }
        }
    }
    ParsedSender {
        email: from.trim().to_lowercase(),
        display_name: None,
    }
}

/// Domain part of an address, lowercased. None when there is no `@`.
pub fn domain_of(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|d| !d.is_empty())
}

/// Local part of an address (before the `@`).
pub fn local_part_of(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_name_and_address() {
        let sender = parse_sender("\"Jane Doe\" <Jane@Example.com>");
        assert_eq!(sender.email, "jane@example.com");
        assert_eq!(sender.display_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn parses_unquoted_display_name() {
        let sender = parse_sender("Jane Doe <jane@example.com>");
        assert_eq!(sender.email, "jane@example.com");
        assert_eq!(sender.display_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn parses_bare_address() {
        let sender = parse_sender("  JANE@example.com ");
        assert_eq!(sender.email, "jane@example.com");
        assert_eq!(sender.display_name, None);
    }

    #[test]
    fn empty_angle_name_is_none() {
        let sender = parse_sender("<jane@example.com>");
        assert_eq!(sender.display_name, None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = HeaderMap::from_pairs([
            ("In-Reply-To", "<abc@mail.example.com>"),
            ("REFERENCES", "<a@x> <b@y>"),
        ]);
        assert_eq!(headers.get("in-reply-to"), Some("<abc@mail.example.com>"));
        assert_eq!(headers.get("In-Reply-To"), Some("<abc@mail.example.com>"));
        assert_eq!(headers.get("references"), Some("<a@x> <b@y>"));
        assert_eq!(headers.get("subject"), None);
    }

    #[test]
    fn domain_and_local_part_extraction() {
        assert_eq!(domain_of("user@Acme.COM").as_deref(), Some("acme.com"));
        assert_eq!(domain_of("not-an-address"), None);
        assert_eq!(local_part_of("new.user@external.com"), "new.user");
    }
}
