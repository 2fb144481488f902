//! Annotation entity - a time-aligned annotation unit for a communication
//!
//! The annotation content itself (interval/point tiers) lives in the external
//! tier store and is only ever referenced through this entity's id.

use crate::object::{CorpusObject, EntityType};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// An annotation unit belonging to a communication, optionally bound to one
/// of its recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    object: CorpusObject,
    communication_id: String,
    recording_id: String,
    name: String,
}

impl Annotation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object: CorpusObject::new(EntityType::Annotation, id),
            communication_id: String::new(),
            recording_id: String::new(),
            name: String::new(),
        }
    }

    /// Reconstruct from a store row; starts clean
    pub(crate) fn from_store(id: impl Into<String>, communication_id: impl Into<String>) -> Self {
        let id = id.into();
        let mut annotation = Self::new(id.clone());
        annotation.object = CorpusObject::from_store(EntityType::Annotation, id);
        annotation.communication_id = communication_id.into();
        annotation
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn communication_id(&self) -> &str {
        &self.communication_id
    }

    pub(crate) fn set_communication_id(&mut self, communication_id: impl Into<String>) {
        let communication_id = communication_id.into();
        if self.communication_id != communication_id {
            self.communication_id = communication_id;
            self.object.mark_dirty();
        }
    }

    /// Id of the recording this annotation is aligned to, empty if none
    pub fn recording_id(&self) -> &str {
        &self.recording_id
    }

    pub fn set_recording_id(&mut self, recording_id: impl Into<String>) {
        let recording_id = recording_id.into();
        if self.recording_id != recording_id {
            self.recording_id = recording_id;
            self.object.mark_dirty();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.object.mark_dirty();
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.object.attribute(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.object.set_attribute(name, value);
    }

    pub fn object(&self) -> &CorpusObject {
        &self.object
    }

    pub(crate) fn object_mut(&mut self) -> &mut CorpusObject {
        &mut self.object
    }
}
