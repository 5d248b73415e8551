//! Include paths (`castMembers`, `castMembers.agent`) parsed into a tree.

use crate::error::{Error, Result};
use crate::naming::to_camel_case;
use crate::orm::Models;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    /// Merge dotted paths; segments are camelized so `cast-members` names `castMembers`.
    pub fn parse<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for path in paths {
            let mut node = &mut tree;
            for segment in path.as_ref().split('.').map(str::trim).filter(|s| !s.is_empty()) {
                node = node.children.entry(to_camel_case(segment)).or_default();
            }
        }
        tree
    }

    pub fn child(&self, name: &str) -> Option<&IncludeTree> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every segment must name a relationship of the model reached so far.
    pub fn validate(&self, models: &Models, model: &str) -> Result<()> {
        let resolved = models
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))?;
        for (name, subtree) in &self.children {
            let rel = resolved
                .relationship(name)
                .ok_or_else(|| Error::UnknownRelationship {
                    model: model.to_string(),
                    name: name.clone(),
                })?;
            subtree.validate(models, &rel.target)?;
        }
        Ok(())
    }
}
