// Shared metadata envelope carried by every atomic value

//! Every atom (`State`, `Transition`, `Work`, `Condition`, `Context`) carries
//! the same descriptive envelope: a non-empty name, an optional description,
//! free-form tags and properties, and creation/update timestamps. Rather than
//! repeat those five fields on every atom struct, they live in
//! [`AtomMetadata`] and are embedded by value.
//!
//! `AtomMetadata` is itself immutable: `touch()` is the only way to produce
//! an updated copy, and it always bumps `updated_at`. Atoms that need their
//! own additional timestamps (e.g. `Work::started_at`) carry those as
//! top-level fields rather than stuffing them into this shared envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomMetadata {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AtomMetadata {
    /// Create a fresh metadata envelope with `created_at == updated_at == now`.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            properties: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the invariant shared by every atom: the name must be non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "atom name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Return a deep copy with independent tag/property containers.
    ///
    /// `Clone` already does this for `AtomMetadata` since none of its fields
    /// are reference-counted, but callers that want to make the "deep copy"
    /// invariant explicit (see the atom-level `Clone` impls) can call this
    /// instead of `.clone()` directly.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Return a copy with `updated_at` bumped to now. Used by every atom
    /// mutator as the last step before returning the new value.
    pub fn touch(&self) -> Self {
        let mut copy = self.clone();
        copy.updated_at = Utc::now();
        copy
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        let mut copy = self.touch();
        copy.description = description.into();
        copy
    }

    pub fn with_tags(&self, tags: Vec<String>) -> Self {
        let mut copy = self.touch();
        copy.tags = tags;
        copy
    }

    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut copy = self.touch();
        copy.properties.insert(key.into(), value.into());
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stamps_equal_timestamps() {
        let m = AtomMetadata::new("demo");
        assert_eq!(m.created_at, m.updated_at);
        assert_eq!(m.name, "demo");
    }

    #[test]
    fn validate_rejects_empty_name() {
        let m = AtomMetadata::new("   ");
        assert!(m.validate().is_err());
    }

    #[test]
    fn touch_bumps_updated_at_but_not_created_at() {
        let m = AtomMetadata::new("demo");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let touched = m.touch();
        assert_eq!(touched.created_at, m.created_at);
        assert!(touched.updated_at > m.updated_at);
    }

    #[test]
    fn deep_copy_is_independent() {
        let m = AtomMetadata::new("demo").with_tags(vec!["a".to_string()]);
        let mut copy = m.deep_copy();
        copy.tags.push("b".to_string());
        assert_eq!(m.tags.len(), 1);
        assert_eq!(copy.tags.len(), 2);
    }
}
