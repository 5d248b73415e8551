//! Serializer configuration: application default plus per-model overrides.

use crate::naming::KeyCase;
use serde::{Deserialize, Serialize};

/// When hasMany relationships are emitted as id lists (`castMemberIds`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SerializeIds {
    /// Only for sideloaded relationships
    #[default]
    Included,
    Always,
    Never,
}

/// Effective configuration for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Wrap payloads in a model-derived root key; without it includes are always embedded
    pub root: bool,
    /// Embed included relationships instead of sideloading them
    pub embed: bool,
    /// Relationship paths always included (dotted for nested)
    pub include: Vec<String>,
    /// Attribute whitelist; `id` is always emitted
    pub attrs: Option<Vec<String>>,
    pub key_case: KeyCase,
    pub serialize_ids: SerializeIds,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            root: true,
            embed: false,
            include: Vec::new(),
            attrs: None,
            key_case: KeyCase::Identity,
            serialize_ids: SerializeIds::Included,
        }
    }
}

/// Partial configuration; set fields win over the configuration it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SerializerOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_case: Option<KeyCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialize_ids: Option<SerializeIds>,
}

impl SerializerOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: bool) -> Self {
        self.root = Some(root);
        self
    }

    pub fn embed(mut self, embed: bool) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn include(mut self, paths: &[&str]) -> Self {
        self.include = Some(paths.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn attrs(mut self, attrs: &[&str]) -> Self {
        self.attrs = Some(attrs.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn key_case(mut self, key_case: KeyCase) -> Self {
        self.key_case = Some(key_case);
        self
    }

    pub fn serialize_ids(mut self, serialize_ids: SerializeIds) -> Self {
        self.serialize_ids = Some(serialize_ids);
        self
    }

    pub fn apply(&self, base: &SerializerConfig) -> SerializerConfig {
        SerializerConfig {
            root: self.root.unwrap_or(base.root),
            embed: self.embed.unwrap_or(base.embed),
            include: self.include.clone().unwrap_or_else(|| base.include.clone()),
            attrs: self.attrs.clone().or_else(|| base.attrs.clone()),
            key_case: self.key_case.unwrap_or(base.key_case),
            serialize_ids: self.serialize_ids.unwrap_or(base.serialize_ids),
        }
    }
}
