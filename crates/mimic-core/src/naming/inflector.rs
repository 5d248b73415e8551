//! Pluralization strategy used for collection names, root keys and shorthand model inference.

use std::fmt;

/// Pluggable pluralization.
///
/// Only the last word of a camelCase identifier is inflected, so `castMember` pluralizes to
/// `castMembers` and `salesPerson` to `salesPeople`.
pub trait Inflector: fmt::Debug {
    fn pluralize(&self, word: &str) -> String;
    fn singularize(&self, word: &str) -> String;
}

/// Rule-based English inflector with a table of irregular and uncountable words.
#[derive(Debug, Clone)]
pub struct English {
    irregular: Vec<(String, String)>,
    uncountable: Vec<String>,
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("movie", "movies"),
    ("cookie", "cookies"),
    ("zombie", "zombies"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
];

impl English {
    pub fn new() -> Self {
        Self {
            irregular: IRREGULAR
                .iter()
                .map(|(s, p)| (s.to_string(), p.to_string()))
                .collect(),
            uncountable: UNCOUNTABLE.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Register an irregular singular/plural pair (lowercase).
    pub fn irregular(mut self, singular: &str, plural: &str) -> Self {
        self.irregular
            .insert(0, (singular.to_lowercase(), plural.to_lowercase()));
        self
    }

    /// Register a word that has no distinct plural form.
    pub fn uncountable(mut self, word: &str) -> Self {
        self.uncountable.push(word.to_lowercase());
        self
    }

    fn pluralize_word(&self, word: &str) -> String {
        if self.uncountable.iter().any(|w| w == word) {
            return word.to_string();
        }
        if let Some((_, plural)) = self.irregular.iter().find(|(s, _)| s == word) {
            return plural.clone();
        }
        if self.irregular.iter().any(|(_, p)| p == word) {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix('y') {
            if stem.ends_with(|c: char| !is_vowel(c)) {
                return format!("{stem}ies");
            }
        }
        if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
            return format!("{word}es");
        }
        format!("{word}s")
    }

    fn singularize_word(&self, word: &str) -> String {
        if self.uncountable.iter().any(|w| w == word) {
            return word.to_string();
        }
        if let Some((singular, _)) = self.irregular.iter().find(|(_, p)| p == word) {
            return singular.clone();
        }
        if self.irregular.iter().any(|(s, _)| s == word) {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
        for suffix in ["sses", "xes", "zes", "ches", "shes"] {
            if word.ends_with(suffix) {
                return word[..word.len() - 2].to_string();
            }
        }
        if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
            return word[..word.len() - 1].to_string();
        }
        word.to_string()
    }
}

impl Default for English {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflector for English {
    fn pluralize(&self, word: &str) -> String {
        inflect_last_word(word, |w| self.pluralize_word(w))
    }

    fn singularize(&self, word: &str) -> String {
        inflect_last_word(word, |w| self.singularize_word(w))
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Split `castMember` into `cast` + `Member`, inflect the lowercased last word and restore its
/// leading capital.
fn inflect_last_word(word: &str, inflect: impl Fn(&str) -> String) -> String {
    let split = word
        .char_indices()
        .filter(|(i, c)| *i > 0 && c.is_uppercase())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0);
    let (prefix, last) = word.split_at(split);
    let capitalized = last.starts_with(char::is_uppercase);
    let inflected = inflect(&last.to_lowercase());
    if capitalized {
        let mut chars = inflected.chars();
        let head: String = chars.next().map(|c| c.to_uppercase().collect()).unwrap_or_default();
        format!("{prefix}{head}{}", chars.as_str())
    } else {
        format!("{prefix}{inflected}")
    }
}
