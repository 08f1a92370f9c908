//! Resource group domain type.

use crate::error::{CloudifyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Top-level namespace owning environments and shared tags.
///
/// Tag keys are case-insensitive: inserting `Owner` replaces an existing
/// `owner` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroup {
    /// Group identifier.
    pub id: Uuid,
    /// Group name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    tags: BTreeMap<String, String>,
}

impl ResourceGroup {
    /// Create a resource group with validated fields.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        tags: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CloudifyError::validation("Resource group name is required."));
        }

        let mut group = Self { id, name, created_at, tags: BTreeMap::new() };
        for (key, value) in tags {
            group.insert_tag(key, value);
        }
        Ok(group)
    }

    /// Insert a tag, replacing any existing key that matches ignoring case.
    pub fn insert_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let existing: Vec<String> = self
            .tags
            .keys()
            .filter(|k| k.eq_ignore_ascii_case(&key))
            .cloned()
            .collect();
        for k in existing {
            self.tags.remove(&k);
        }
        self.tags.insert(key, value.into());
    }

    /// Look up a tag value ignoring key case.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All tags, sorted by key.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_rejected() {
        let err = ResourceGroup::new(Uuid::new_v4(), "  ", Utc::now(), []).unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        let mut group = ResourceGroup::new(Uuid::new_v4(), "rg", Utc::now(), []).unwrap();
        group.insert_tag("Owner", "platform");
        group.insert_tag("owner", "infra");

        assert_eq!(group.tags().len(), 1);
        assert_eq!(group.tag("OWNER"), Some("infra"));
    }
}
