//! Corpus object - the entity base shared by every metadata entity
//!
//! Provides uniform identity, the new/dirty/clean lifecycle state machine,
//! and the dynamic attribute map layered over each entity's fixed fields.

use crate::value::AttributeValue;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Immutable discriminator carried by every entity.
///
/// The serializer uses it to select the statement template for the entity's
/// table; it never changes after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Corpus,
    Communication,
    Speaker,
    Recording,
    Annotation,
    Participation,
    Bookmark,
    Undefined,
}

impl EntityType {
    /// Get the string representation of the entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Corpus => "corpus",
            EntityType::Communication => "communication",
            EntityType::Speaker => "speaker",
            EntityType::Recording => "recording",
            EntityType::Annotation => "annotation",
            EntityType::Participation => "participation",
            EntityType::Bookmark => "bookmark",
            EntityType::Undefined => "undefined",
        }
    }

    /// Get all entity types
    pub fn all() -> &'static [EntityType] {
        &[
            EntityType::Corpus,
            EntityType::Communication,
            EntityType::Speaker,
            EntityType::Recording,
            EntityType::Annotation,
            EntityType::Participation,
            EntityType::Bookmark,
            EntityType::Undefined,
        ]
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "corpus" => Ok(EntityType::Corpus),
            "communication" | "com" => Ok(EntityType::Communication),
            "speaker" | "spk" => Ok(EntityType::Speaker),
            "recording" | "rec" => Ok(EntityType::Recording),
            "annotation" | "annot" => Ok(EntityType::Annotation),
            "participation" => Ok(EntityType::Participation),
            "bookmark" => Ok(EntityType::Bookmark),
            "undefined" => Ok(EntityType::Undefined),
            _ => Err(Error::UnknownEntityType(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared entity base: identity, lifecycle flags, dynamic attributes.
///
/// Lifecycle: a freshly constructed object is `(is_new=true, is_dirty=true)`.
/// Mutations set dirty; only a successful persistence operation clears either
/// flag. `original_id` stays anchored at the id the store last saw, so a
/// renamed entity can still locate its row for UPDATE/DELETE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusObject {
    entity_type: EntityType,
    id: String,
    original_id: String,
    corpus_id: String,
    is_new: bool,
    is_dirty: bool,
    attributes: BTreeMap<String, AttributeValue>,
}

impl CorpusObject {
    /// Create a new in-memory entity, not yet known to the store
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            entity_type,
            original_id: id.clone(),
            id,
            corpus_id: String::new(),
            is_new: true,
            is_dirty: true,
            attributes: BTreeMap::new(),
        }
    }

    /// Reconstruct an entity from a store row; starts clean
    pub fn from_store(entity_type: EntityType, id: impl Into<String>) -> Self {
        let mut object = Self::new(entity_type, id);
        object.is_new = false;
        object.is_dirty = false;
        object
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id the store last saw for this entity (row locator)
    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    pub fn corpus_id(&self) -> &str {
        &self.corpus_id
    }

    /// Change-detecting setter for the owning corpus id
    pub fn set_corpus_id(&mut self, corpus_id: impl Into<String>) {
        let corpus_id = corpus_id.into();
        if self.corpus_id != corpus_id {
            self.corpus_id = corpus_id;
            self.is_dirty = true;
        }
    }

    /// Rename the entity. `original_id` keeps pointing at the persisted row
    /// until the next successful save. Returns true if the id changed.
    pub fn set_id(&mut self, new_id: impl Into<String>) -> bool {
        let new_id = new_id.into();
        if self.id == new_id {
            return false;
        }
        self.id = new_id;
        self.is_dirty = true;
        true
    }

    // ========== Lifecycle flags ==========

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_clean(&self) -> bool {
        !self.is_new && !self.is_dirty
    }

    /// Mark unsaved changes (used by typed setters on the entity wrappers)
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Called after a successful persistence operation: clears both flags and
    /// re-anchors `original_id` at the current id.
    pub fn mark_clean(&mut self) {
        self.is_new = false;
        self.is_dirty = false;
        self.original_id = self.id.clone();
    }

    // ========== Dynamic attributes ==========

    /// Get a dynamic attribute value
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Set a dynamic attribute.
    ///
    /// Marks the entity dirty unconditionally, even when the new value equals
    /// the old one; typed setters on the entity wrappers short-circuit on
    /// equality instead, so this is also the way to force a rewrite.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
        self.is_dirty = true;
    }

    /// Set an attribute read back from the store without touching the flags
    pub(crate) fn load_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    /// Remove a dynamic attribute; marks dirty if it was present
    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.is_dirty = true;
        }
        removed
    }

    /// All dynamic attributes in name order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_roundtrip() {
        for et in EntityType::all() {
            let parsed: EntityType = et.as_str().parse().unwrap();
            assert_eq!(*et, parsed);
        }
    }

    #[test]
    fn test_fresh_object_is_new_and_dirty() {
        let object = CorpusObject::new(EntityType::Communication, "COM1");
        assert!(object.is_new());
        assert!(object.is_dirty());
        assert!(!object.is_clean());
        assert_eq!(object.id(), "COM1");
        assert_eq!(object.original_id(), "COM1");
    }

    #[test]
    fn test_mark_clean_then_mutate() {
        let mut object = CorpusObject::new(EntityType::Speaker, "SPK1");
        object.mark_clean();
        assert!(object.is_clean());

        object.set_attribute("dialect", "northern");
        assert!(!object.is_new());
        assert!(object.is_dirty());
    }

    #[test]
    fn test_generic_setter_always_dirties() {
        let mut object = CorpusObject::new(EntityType::Communication, "COM1");
        object.set_attribute("topic", "news");
        object.mark_clean();

        // same value, still dirty: the generic path does not compare
        object.set_attribute("topic", "news");
        assert!(object.is_dirty());
    }

    #[test]
    fn test_rename_keeps_original_id_until_clean() {
        let mut object = CorpusObject::new(EntityType::Communication, "COM1");
        object.mark_clean();

        assert!(object.set_id("COM1-renamed"));
        assert_eq!(object.id(), "COM1-renamed");
        assert_eq!(object.original_id(), "COM1");
        assert!(object.is_dirty());

        // renaming to the current id is a no-op
        assert!(!object.set_id("COM1-renamed"));

        object.mark_clean();
        assert_eq!(object.original_id(), "COM1-renamed");
    }

    #[test]
    fn test_from_store_starts_clean() {
        let object = CorpusObject::from_store(EntityType::Recording, "REC1");
        assert!(object.is_clean());
    }
}
