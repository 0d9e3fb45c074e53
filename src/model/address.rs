//! Participant addresses and alias extraction.

use crate::error::{NormalizeError, Result};

/// A message participant: display name plus bare address.
///
/// # Examples
/// - `"Jane Doe <jdoe@example.com>"` → `name = "Jane Doe"`, `address = "jdoe@example.com"`
/// - `"jdoe@example.com"` → `name = ""`, `address = "jdoe@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox from a header value.
    ///
    /// Accepts `addr`, `<addr>`, `Name <addr>` and `"Quoted, Name" <addr>`.
    /// Anything else is kept verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated mailbox list, honoring quotes and angle brackets.
    ///
    /// Entries with an empty address are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut mailboxes = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut in_angle = false;

        for (pos, ch) in raw.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    mailboxes.push(Self::parse(&raw[start..pos]));
                    start = pos + 1;
                }
                _ => {}
            }
        }
        mailboxes.push(Self::parse(&raw[start..]));

        mailboxes.retain(|m| !m.address.is_empty());
        mailboxes
    }

    /// Local part of the address, see [`alias_from_address`].
    pub fn alias(&self) -> Result<String> {
        alias_from_address(Some(&self.address))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

/// Extract the alias (local part) from an email address.
///
/// Fails with [`NormalizeError::InvalidArgument`] only for an absent or empty
/// address. A leading `@` or a missing `@` returns the address unchanged.
pub fn alias_from_address(address: Option<&str>) -> Result<String> {
    let address = match address {
        Some(a) if !a.is_empty() => a,
        _ => {
            return Err(NormalizeError::InvalidArgument(
                "address must not be empty".into(),
            ))
        }
    };

    match address.split_once('@') {
        Some((local, _)) if !local.is_empty() => Ok(local.to_string()),
        _ => Ok(address.to_string()),
    }
}

/// Strip surrounding double quotes and whitespace from a display name.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_plain_address() {
        assert_eq!(alias_from_address(Some("jdoe@example.com")).unwrap(), "jdoe");
    }

    #[test]
    fn test_alias_leading_at_falls_back() {
        assert_eq!(
            alias_from_address(Some("@example.com")).unwrap(),
            "@example.com"
        );
    }

    #[test]
    fn test_alias_without_at_falls_back() {
        assert_eq!(alias_from_address(Some("postmaster")).unwrap(), "postmaster");
    }

    #[test]
    fn test_alias_uses_first_at() {
        assert_eq!(alias_from_address(Some("a@b@c")).unwrap(), "a");
    }

    #[test]
    fn test_alias_empty_and_absent_fail() {
        assert!(matches!(
            alias_from_address(Some("")),
            Err(NormalizeError::InvalidArgument(_))
        ));
        assert!(matches!(
            alias_from_address(None),
            Err(NormalizeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("Jane Doe <jdoe@example.com>");
        assert_eq!(addr.name, "Jane Doe");
        assert_eq!(addr.address, "jdoe@example.com");
        assert_eq!(addr.alias().unwrap(), "jdoe");
    }

    #[test]
    fn test_parse_bare_and_angle() {
        assert_eq!(EmailAddress::parse(" user@example.com ").address, "user@example.com");
        let angle = EmailAddress::parse("<user@example.com>");
        assert_eq!(angle.address, "user@example.com");
        assert_eq!(angle.name, "");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Doe, Jane\" <a@b.com>, other@c.com, ");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Doe, Jane");
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].address, "other@c.com");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EmailAddress::new("Alice", "alice@example.com").to_string(),
            "Alice <alice@example.com>"
        );
        assert_eq!(
            EmailAddress::new("", "alice@example.com").to_string(),
            "alice@example.com"
        );
    }
}
