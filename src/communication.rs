//! Communication entity - an interaction unit owning recordings and annotations

use crate::annotation::Annotation;
use crate::object::{CorpusObject, EntityType};
use crate::recording::Recording;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A communication (interview, dialogue, session) within a corpus.
///
/// Exclusively owns its recordings and annotations, keyed by id. Removing a
/// child only destroys the in-memory object; its id is recorded on the
/// matching pending-delete list and the row goes away on the next save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    object: CorpusObject,
    name: String,
    recordings: BTreeMap<String, Recording>,
    annotations: BTreeMap<String, Annotation>,
    deleted_recording_ids: Vec<String>,
    deleted_annotation_ids: Vec<String>,
}

impl Communication {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object: CorpusObject::new(EntityType::Communication, id),
            name: String::new(),
            recordings: BTreeMap::new(),
            annotations: BTreeMap::new(),
            deleted_recording_ids: Vec::new(),
            deleted_annotation_ids: Vec::new(),
        }
    }

    /// Reconstruct from a store row; starts clean
    pub(crate) fn from_store(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let mut communication = Self::new(id.clone());
        communication.object = CorpusObject::from_store(EntityType::Communication, id);
        communication.name = name.into();
        communication
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn corpus_id(&self) -> &str {
        self.object.corpus_id()
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

    // ========== Recordings ==========

    /// Add a recording; stamps this communication's id onto it. Does not
    /// persist. Replaces any existing recording with the same id.
    pub fn add_recording(&mut self, mut recording: Recording) {
        recording.set_communication_id(self.object.id().to_string());
        self.recordings.insert(recording.id().to_string(), recording);
    }

    pub fn recording(&self, id: &str) -> Option<&Recording> {
        self.recordings.get(id)
    }

    pub fn recording_mut(&mut self, id: &str) -> Option<&mut Recording> {
        self.recordings.get_mut(id)
    }

    pub fn recordings(&self) -> impl Iterator<Item = &Recording> {
        self.recordings.values()
    }

    pub(crate) fn recordings_mut(&mut self) -> impl Iterator<Item = &mut Recording> {
        self.recordings.values_mut()
    }

    pub fn recording_count(&self) -> usize {
        self.recordings.len()
    }

    /// Remove a recording from memory and record its id for deletion on the
    /// next save. Returns false if the id is unknown.
    pub fn remove_recording(&mut self, id: &str) -> bool {
        match self.recordings.remove(id) {
            Some(recording) => {
                // the row is located by the id the store knows
                self.deleted_recording_ids.push(recording.object().original_id().to_string());
                true
            }
            None => false,
        }
    }

    /// Re-key a recording under a new id. Returns false if the old id is
    /// unknown or the new id is already taken.
    pub fn rename_recording(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || self.recordings.contains_key(new_id) {
            return false;
        }
        match self.recordings.remove(old_id) {
            Some(mut recording) => {
                recording.object_mut().set_id(new_id);
                self.recordings.insert(new_id.to_string(), recording);
                true
            }
            None => false,
        }
    }

    // ========== Annotations ==========

    /// Add an annotation; stamps this communication's id onto it.
    pub fn add_annotation(&mut self, mut annotation: Annotation) {
        annotation.set_communication_id(self.object.id().to_string());
        self.annotations.insert(annotation.id().to_string(), annotation);
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    pub fn annotation_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.annotations.get_mut(id)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub(crate) fn annotations_mut(&mut self) -> impl Iterator<Item = &mut Annotation> {
        self.annotations.values_mut()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Remove an annotation from memory and record its id for deletion.
    pub fn remove_annotation(&mut self, id: &str) -> bool {
        match self.annotations.remove(id) {
            Some(annotation) => {
                self.deleted_annotation_ids.push(annotation.object().original_id().to_string());
                true
            }
            None => false,
        }
    }

    /// Re-key an annotation under a new id.
    pub fn rename_annotation(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || self.annotations.contains_key(new_id) {
            return false;
        }
        match self.annotations.remove(old_id) {
            Some(mut annotation) => {
                annotation.object_mut().set_id(new_id);
                self.annotations.insert(new_id.to_string(), annotation);
                true
            }
            None => false,
        }
    }

    // ========== Pending deletes ==========

    pub fn deleted_recording_ids(&self) -> &[String] {
        &self.deleted_recording_ids
    }

    pub fn deleted_annotation_ids(&self) -> &[String] {
        &self.deleted_annotation_ids
    }

    /// Drained by the serializer once the delete statements have committed
    pub(crate) fn clear_deleted_recording_ids(&mut self) {
        self.deleted_recording_ids.clear();
    }

    pub(crate) fn clear_deleted_annotation_ids(&mut self) {
        self.deleted_annotation_ids.clear();
    }

    /// Called by the owning corpus when this communication is renamed, so
    /// children keep a valid back-reference.
    pub(crate) fn propagate_id_to_children(&mut self) {
        let id = self.object.id().to_string();
        for recording in self.recordings.values_mut() {
            recording.set_communication_id(id.clone());
        }
        for annotation in self.annotations.values_mut() {
            annotation.set_communication_id(id.clone());
        }
    }

    pub(crate) fn set_corpus_id(&mut self, corpus_id: impl Into<String>) {
        self.object.set_corpus_id(corpus_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_recording_stamps_parent_id() {
        let mut com = Communication::new("COM1");
        com.add_recording(Recording::new("REC1"));
        assert_eq!(com.recording("REC1").unwrap().communication_id(), "COM1");
    }

    #[test]
    fn test_remove_recording_records_pending_delete() {
        let mut com = Communication::new("COM1");
        com.add_recording(Recording::new("REC1"));

        assert!(com.remove_recording("REC1"));
        assert!(com.recording("REC1").is_none());
        assert_eq!(com.deleted_recording_ids(), &["REC1".to_string()]);

        // unknown id leaves the list alone
        assert!(!com.remove_recording("REC1"));
        assert_eq!(com.deleted_recording_ids().len(), 1);
    }

    #[test]
    fn test_rename_recording_rekeys() {
        let mut com = Communication::new("COM1");
        com.add_recording(Recording::new("REC1"));

        assert!(com.rename_recording("REC1", "REC1-take2"));
        assert!(com.recording("REC1").is_none());
        let recording = com.recording("REC1-take2").unwrap();
        assert_eq!(recording.id(), "REC1-take2");
        assert_eq!(recording.object().original_id(), "REC1");
    }

    #[test]
    fn test_rename_refuses_collision() {
        let mut com = Communication::new("COM1");
        com.add_recording(Recording::new("REC1"));
        com.add_recording(Recording::new("REC2"));
        assert!(!com.rename_recording("REC1", "REC2"));
        assert_eq!(com.recording_count(), 2);
    }
}
