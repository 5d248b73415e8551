//! Key case conversion between camelCase (storage), snake_case and kebab-case.

use serde::{Deserialize, Serialize};

/// Key transform applied by serializers to attribute, relationship and root keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCase {
    /// Keys are emitted as stored
    #[default]
    Identity,
    Camel,
    Snake,
    Kebab,
}

impl KeyCase {
    pub fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Identity => key.to_string(),
            KeyCase::Camel => to_camel_case(key),
            KeyCase::Snake => to_snake_case(key),
            KeyCase::Kebab => to_kebab_case(key),
        }
    }
}

/// Convert snake_case or kebab-case to camelCase.
/// e.g. "cast_members" -> "castMembers", "cast-members" -> "castMembers"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' || c == '-' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert camelCase (or kebab-case) to snake_case.
/// e.g. "castMemberIds" -> "cast_member_ids"
pub fn to_snake_case(s: &str) -> String {
    separate(s, '_')
}

/// Convert camelCase (or snake_case) to kebab-case.
/// e.g. "castMembers" -> "cast-members"
pub fn to_kebab_case(s: &str) -> String {
    separate(s, '-')
}

fn separate(s: &str, separator: char) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with(separator) {
                out.push(separator);
            }
            out.extend(c.to_lowercase());
        } else if c == '_' || c == '-' {
            if !out.is_empty() {
                out.push(separator);
            }
        } else {
            out.push(c);
        }
    }
    out
}
