//! Corpus aggregate - the root of the corpus object graph
//!
//! Exclusively owns communications and speakers, and derives participations
//! linking the two. Participations are indexed from both endpoints so either
//! side resolves in O(1). Removal never touches the store directly: removed
//! ids accumulate on pending-delete lists that the serializer drains after
//! the delete statements commit.

use crate::communication::Communication;
use crate::object::{CorpusObject, EntityType};
use crate::participation::{self, Participation, DELETED_SENTINEL};
use crate::speaker::Speaker;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The in-memory corpus: communications, speakers, participations, and the
/// bookkeeping needed to keep them consistent with the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    object: CorpusObject,
    name: String,
    communications: BTreeMap<String, Communication>,
    speakers: BTreeMap<String, Speaker>,
    /// Participations keyed by derived id `comID_x_spkID`
    participations: BTreeMap<String, Participation>,
    /// communication id -> participation ids (O(1) lookup from that side)
    participations_by_communication: HashMap<String, Vec<String>>,
    /// speaker id -> participation ids
    participations_by_speaker: HashMap<String, Vec<String>>,
    deleted_communication_ids: Vec<String>,
    deleted_speaker_ids: Vec<String>,
    /// (communicationID, speakerID) pairs, the composite row locators
    deleted_participation_ids: Vec<(String, String)>,
}

impl Corpus {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut object = CorpusObject::new(EntityType::Corpus, id.clone());
        object.set_corpus_id(id);
        Self {
            object,
            name: String::new(),
            communications: BTreeMap::new(),
            speakers: BTreeMap::new(),
            participations: BTreeMap::new(),
            participations_by_communication: HashMap::new(),
            participations_by_speaker: HashMap::new(),
            deleted_communication_ids: Vec::new(),
            deleted_speaker_ids: Vec::new(),
            deleted_participation_ids: Vec::new(),
        }
    }

    /// Reconstruct from the store; starts clean
    pub(crate) fn from_store(id: impl Into<String>) -> Self {
        let mut corpus = Self::new(id);
        corpus.object.mark_clean();
        corpus
    }

    pub fn id(&self) -> &str {
        self.object.id()
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

    // ========== Communications ==========

    /// Add a communication; stamps this corpus's id onto it. Does not
    /// persist. Replaces any existing communication with the same id.
    pub fn add_communication(&mut self, mut communication: Communication) {
        communication.set_corpus_id(self.object.id().to_string());
        self.communications.insert(communication.id().to_string(), communication);
    }

    pub fn communication(&self, id: &str) -> Option<&Communication> {
        self.communications.get(id)
    }

    pub fn communication_mut(&mut self, id: &str) -> Option<&mut Communication> {
        self.communications.get_mut(id)
    }

    pub fn communications(&self) -> impl Iterator<Item = &Communication> {
        self.communications.values()
    }

    pub fn communication_count(&self) -> usize {
        self.communications.len()
    }

    /// Remove a communication from memory, recording its id for deletion.
    ///
    /// Dependent participations are NOT removed: they go stale and resolve
    /// their identity through the `(deleted)` sentinel until removed
    /// explicitly with [`remove_participation`](Self::remove_participation).
    pub fn remove_communication(&mut self, id: &str) -> bool {
        match self.communications.remove(id) {
            Some(communication) => {
                self.deleted_communication_ids
                    .push(communication.object().original_id().to_string());
                true
            }
            None => false,
        }
    }

    /// Re-key a communication under a new id, cascading into its children's
    /// back-references and into the derived identity of its participations.
    /// Returns false if the old id is unknown or the new id is taken.
    pub fn rename_communication(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || self.communications.contains_key(new_id) {
            return false;
        }
        // a stale participation may already hold a derived id the re-key
        // would produce; refuse rather than overwrite it
        if let Some(participation_ids) = self.participations_by_communication.get(old_id) {
            for pid in participation_ids {
                if let Some(participation) = self.participations.get(pid) {
                    let new_pid = participation::derive_id(new_id, participation.speaker_id());
                    if self.participations.contains_key(&new_pid) {
                        return false;
                    }
                }
            }
        }
        let mut communication = match self.communications.remove(old_id) {
            Some(c) => c,
            None => return false,
        };
        communication.object_mut().set_id(new_id);
        communication.propagate_id_to_children();
        self.communications.insert(new_id.to_string(), communication);

        // re-derive every participation hanging off this endpoint
        if let Some(participation_ids) = self.participations_by_communication.remove(old_id) {
            let mut rekeyed = Vec::with_capacity(participation_ids.len());
            for pid in participation_ids {
                if let Some(mut participation) = self.participations.remove(&pid) {
                    participation.set_communication_id(new_id);
                    let new_pid = participation.id().to_string();
                    let speaker_id = participation.speaker_id().to_string();
                    self.participations.insert(new_pid.clone(), participation);
                    replace_index_entry(
                        &mut self.participations_by_speaker,
                        &speaker_id,
                        &pid,
                        &new_pid,
                    );
                    rekeyed.push(new_pid);
                }
            }
            self.participations_by_communication.insert(new_id.to_string(), rekeyed);
        }
        true
    }

    // ========== Speakers ==========

    /// Add a speaker; stamps this corpus's id onto it. Does not persist.
    pub fn add_speaker(&mut self, mut speaker: Speaker) {
        speaker.object_mut().set_corpus_id(self.object.id().to_string());
        self.speakers.insert(speaker.id().to_string(), speaker);
    }

    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.speakers.get(id)
    }

    pub fn speaker_mut(&mut self, id: &str) -> Option<&mut Speaker> {
        self.speakers.get_mut(id)
    }

    pub fn speakers(&self) -> impl Iterator<Item = &Speaker> {
        self.speakers.values()
    }

    pub fn speaker_count(&self) -> usize {
        self.speakers.len()
    }

    /// Remove a speaker from memory, recording its id for deletion.
    /// Dependent participations are NOT removed (same policy as
    /// [`remove_communication`](Self::remove_communication)).
    pub fn remove_speaker(&mut self, id: &str) -> bool {
        match self.speakers.remove(id) {
            Some(speaker) => {
                self.deleted_speaker_ids.push(speaker.object().original_id().to_string());
                true
            }
            None => false,
        }
    }

    /// Re-key a speaker under a new id, cascading into participations.
    pub fn rename_speaker(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || self.speakers.contains_key(new_id) {
            return false;
        }
        if let Some(participation_ids) = self.participations_by_speaker.get(old_id) {
            for pid in participation_ids {
                if let Some(participation) = self.participations.get(pid) {
                    let new_pid = participation::derive_id(participation.communication_id(), new_id);
                    if self.participations.contains_key(&new_pid) {
                        return false;
                    }
                }
            }
        }
        let mut speaker = match self.speakers.remove(old_id) {
            Some(s) => s,
            None => return false,
        };
        speaker.object_mut().set_id(new_id);
        self.speakers.insert(new_id.to_string(), speaker);

        if let Some(participation_ids) = self.participations_by_speaker.remove(old_id) {
            let mut rekeyed = Vec::with_capacity(participation_ids.len());
            for pid in participation_ids {
                if let Some(mut participation) = self.participations.remove(&pid) {
                    participation.set_speaker_id(new_id);
                    let new_pid = participation.id().to_string();
                    let communication_id = participation.communication_id().to_string();
                    self.participations.insert(new_pid.clone(), participation);
                    replace_index_entry(
                        &mut self.participations_by_communication,
                        &communication_id,
                        &pid,
                        &new_pid,
                    );
                    rekeyed.push(new_pid);
                }
            }
            self.participations_by_speaker.insert(new_id.to_string(), rekeyed);
        }
        true
    }

    // ========== Participations ==========

    /// Link a speaker to a communication with a role.
    ///
    /// Returns `None` when either endpoint is absent from the corpus. If the
    /// pair is already linked, returns the existing participation unchanged.
    pub fn add_participation(
        &mut self,
        communication_id: &str,
        speaker_id: &str,
        role: &str,
    ) -> Option<&Participation> {
        if !self.communications.contains_key(communication_id)
            || !self.speakers.contains_key(speaker_id)
        {
            return None;
        }
        let pid = participation::derive_id(communication_id, speaker_id);
        if !self.participations.contains_key(&pid) {
            let mut participation = Participation::new(communication_id, speaker_id, role);
            participation.object_mut().set_corpus_id(self.object.id().to_string());
            self.participations.insert(pid.clone(), participation);
            self.participations_by_communication
                .entry(communication_id.to_string())
                .or_default()
                .push(pid.clone());
            self.participations_by_speaker
                .entry(speaker_id.to_string())
                .or_default()
                .push(pid.clone());
        }
        self.participations.get(&pid)
    }

    /// Insert a participation read back from the store. Skips the endpoint
    /// presence check: stale rows (endpoint deleted elsewhere) must still
    /// load so they stay inspectable and removable.
    pub(crate) fn insert_loaded_participation(&mut self, participation: Participation) {
        let pid = participation.id().to_string();
        self.participations_by_communication
            .entry(participation.communication_id().to_string())
            .or_default()
            .push(pid.clone());
        self.participations_by_speaker
            .entry(participation.speaker_id().to_string())
            .or_default()
            .push(pid.clone());
        self.participations.insert(pid, participation);
    }

    pub fn participation(&self, communication_id: &str, speaker_id: &str) -> Option<&Participation> {
        self.participations.get(&participation::derive_id(communication_id, speaker_id))
    }

    pub fn participation_mut(
        &mut self,
        communication_id: &str,
        speaker_id: &str,
    ) -> Option<&mut Participation> {
        self.participations.get_mut(&participation::derive_id(communication_id, speaker_id))
    }

    pub fn participations(&self) -> impl Iterator<Item = &Participation> {
        self.participations.values()
    }

    pub fn participation_count(&self) -> usize {
        self.participations.len()
    }

    /// Participations of one communication, via the communication-side index
    pub fn participations_for_communication(&self, communication_id: &str) -> Vec<&Participation> {
        self.participations_by_communication
            .get(communication_id)
            .map(|pids| pids.iter().filter_map(|pid| self.participations.get(pid)).collect())
            .unwrap_or_default()
    }

    /// Participations of one speaker, via the speaker-side index
    pub fn participations_for_speaker(&self, speaker_id: &str) -> Vec<&Participation> {
        self.participations_by_speaker
            .get(speaker_id)
            .map(|pids| pids.iter().filter_map(|pid| self.participations.get(pid)).collect())
            .unwrap_or_default()
    }

    /// The participation's logical identity as seen from this corpus: any
    /// endpoint whose entity is gone resolves to the `(deleted)` sentinel.
    pub fn participation_display_id(&self, participation: &Participation) -> String {
        let com = if self.communications.contains_key(participation.communication_id()) {
            participation.communication_id()
        } else {
            DELETED_SENTINEL
        };
        let spk = if self.speakers.contains_key(participation.speaker_id()) {
            participation.speaker_id()
        } else {
            DELETED_SENTINEL
        };
        participation::derive_id(com, spk)
    }

    /// Unlink a speaker from a communication, recording the id pair for
    /// deletion on the next save.
    pub fn remove_participation(&mut self, communication_id: &str, speaker_id: &str) -> bool {
        let pid = participation::derive_id(communication_id, speaker_id);
        match self.participations.remove(&pid) {
            Some(participation) => {
                remove_index_entry(
                    &mut self.participations_by_communication,
                    participation.communication_id(),
                    &pid,
                );
                remove_index_entry(
                    &mut self.participations_by_speaker,
                    participation.speaker_id(),
                    &pid,
                );
                let (com, spk) = participation.original_endpoint_ids();
                self.deleted_participation_ids.push((com.to_string(), spk.to_string()));
                true
            }
            None => false,
        }
    }

    // ========== Pending deletes ==========

    pub fn deleted_communication_ids(&self) -> &[String] {
        &self.deleted_communication_ids
    }

    pub fn deleted_speaker_ids(&self) -> &[String] {
        &self.deleted_speaker_ids
    }

    pub fn deleted_participation_ids(&self) -> &[(String, String)] {
        &self.deleted_participation_ids
    }

    /// Called once a save has committed (or a load has finished): drains
    /// every pending-delete list and marks every entity in the graph clean.
    pub(crate) fn mark_stored(&mut self) {
        self.deleted_communication_ids.clear();
        self.deleted_speaker_ids.clear();
        self.deleted_participation_ids.clear();
        for communication in self.communications.values_mut() {
            communication.clear_deleted_recording_ids();
            communication.clear_deleted_annotation_ids();
            for recording in communication.recordings_mut() {
                recording.object_mut().mark_clean();
            }
            for annotation in communication.annotations_mut() {
                annotation.object_mut().mark_clean();
            }
            communication.object_mut().mark_clean();
        }
        for speaker in self.speakers.values_mut() {
            speaker.object_mut().mark_clean();
        }
        for participation in self.participations.values_mut() {
            participation.mark_clean();
        }
        self.object.mark_clean();
    }

    /// True when nothing in the graph needs writing or deleting
    pub fn is_fully_clean(&self) -> bool {
        self.object.is_clean()
            && self.deleted_communication_ids.is_empty()
            && self.deleted_speaker_ids.is_empty()
            && self.deleted_participation_ids.is_empty()
            && self.communications.values().all(|c| {
                c.object().is_clean()
                    && c.deleted_recording_ids().is_empty()
                    && c.deleted_annotation_ids().is_empty()
                    && c.recordings().all(|r| r.object().is_clean())
                    && c.annotations().all(|a| a.object().is_clean())
            })
            && self.speakers.values().all(|s| s.object().is_clean())
            && self.participations.values().all(|p| p.object().is_clean())
    }
}

fn replace_index_entry(
    index: &mut HashMap<String, Vec<String>>,
    key: &str,
    old_value: &str,
    new_value: &str,
) {
    if let Some(entries) = index.get_mut(key) {
        for entry in entries.iter_mut() {
            if entry == old_value {
                *entry = new_value.to_string();
            }
        }
    }
}

fn remove_index_entry(index: &mut HashMap<String, Vec<String>>, key: &str, value: &str) {
    if let Some(entries) = index.get_mut(key) {
        entries.retain(|entry| entry != value);
        if entries.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_with_pair() -> Corpus {
        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        corpus.add_speaker(Speaker::new("SPK1"));
        corpus
    }

    #[test]
    fn test_add_communication_stamps_corpus_id() {
        let corpus = {
            let mut c = corpus_with_pair();
            c.add_communication(Communication::new("COM2"));
            c
        };
        assert_eq!(corpus.communication("COM2").unwrap().corpus_id(), "C1");
    }

    #[test]
    fn test_add_participation_requires_both_endpoints() {
        let mut corpus = corpus_with_pair();
        assert!(corpus.add_participation("COM1", "NOBODY", "x").is_none());
        assert!(corpus.add_participation("NOTHING", "SPK1", "x").is_none());

        let participation = corpus.add_participation("COM1", "SPK1", "interviewer").unwrap();
        assert_eq!(participation.id(), "COM1_x_SPK1");

        // second call returns the existing link, role unchanged
        let again = corpus.add_participation("COM1", "SPK1", "other").unwrap();
        assert_eq!(again.role(), "interviewer");
        assert_eq!(corpus.participation_count(), 1);
    }

    #[test]
    fn test_participation_indexed_from_both_sides() {
        let mut corpus = corpus_with_pair();
        corpus.add_speaker(Speaker::new("SPK2"));
        corpus.add_participation("COM1", "SPK1", "a");
        corpus.add_participation("COM1", "SPK2", "b");

        assert_eq!(corpus.participations_for_communication("COM1").len(), 2);
        assert_eq!(corpus.participations_for_speaker("SPK1").len(), 1);
    }

    #[test]
    fn test_rename_communication_rekeys_and_cascades() {
        let mut corpus = corpus_with_pair();
        corpus
            .communication_mut("COM1")
            .unwrap()
            .add_recording(crate::recording::Recording::new("REC1"));
        corpus.add_participation("COM1", "SPK1", "interviewer");

        assert!(corpus.rename_communication("COM1", "COM9"));
        assert!(corpus.communication("COM1").is_none());

        let communication = corpus.communication("COM9").unwrap();
        assert_eq!(communication.recording("REC1").unwrap().communication_id(), "COM9");

        // participation re-derived without duplication
        assert_eq!(corpus.participation_count(), 1);
        let participation = corpus.participation("COM9", "SPK1").unwrap();
        assert_eq!(participation.id(), "COM9_x_SPK1");
        assert!(corpus.participation("COM1", "SPK1").is_none());
        assert_eq!(corpus.participations_for_communication("COM9").len(), 1);
        assert_eq!(corpus.participations_for_speaker("SPK1")[0].id(), "COM9_x_SPK1");
    }

    #[test]
    fn test_rename_speaker_rekeys_participation() {
        let mut corpus = corpus_with_pair();
        corpus.add_participation("COM1", "SPK1", "");

        assert!(corpus.rename_speaker("SPK1", "SPK7"));
        assert_eq!(corpus.participation("COM1", "SPK7").unwrap().id(), "COM1_x_SPK7");
        assert_eq!(corpus.participations_for_speaker("SPK7").len(), 1);
        assert!(corpus.participations_for_speaker("SPK1").is_empty());
    }

    #[test]
    fn test_rename_refuses_stale_participation_collision() {
        let mut corpus = corpus_with_pair();
        corpus.add_participation("COM1", "SPK1", "interviewer");
        // a stale link whose communication endpoint is gone from this corpus,
        // read back from the store in an earlier session
        corpus.insert_loaded_participation(Participation::from_store("COM9", "SPK1", "old"));

        // re-keying COM1_x_SPK1 would land on the stale COM9_x_SPK1
        assert!(!corpus.rename_communication("COM1", "COM9"));
        assert!(corpus.communication("COM1").is_some());
        assert_eq!(corpus.participation("COM1", "SPK1").unwrap().role(), "interviewer");
        assert_eq!(corpus.participation("COM9", "SPK1").unwrap().role(), "old");
        assert_eq!(corpus.participations_for_speaker("SPK1").len(), 2);

        // same guard on the speaker side
        corpus.insert_loaded_participation(Participation::from_store("COM1", "SPK9", "old"));
        assert!(!corpus.rename_speaker("SPK1", "SPK9"));
        assert_eq!(corpus.participation("COM1", "SPK1").unwrap().role(), "interviewer");
    }

    #[test]
    fn test_remove_communication_leaves_participation_stale() {
        let mut corpus = corpus_with_pair();
        corpus.add_participation("COM1", "SPK1", "");

        assert!(corpus.remove_communication("COM1"));
        assert_eq!(corpus.deleted_communication_ids(), &["COM1".to_string()]);

        // participation still present, endpoint resolves to the sentinel
        let participation = corpus.participation("COM1", "SPK1").unwrap();
        assert_eq!(corpus.participation_display_id(participation), "(deleted)_x_SPK1");

        // and remains removable
        assert!(corpus.remove_participation("COM1", "SPK1"));
        assert_eq!(
            corpus.deleted_participation_ids(),
            &[("COM1".to_string(), "SPK1".to_string())]
        );
    }

    #[test]
    fn test_remove_speaker_records_pending_delete() {
        let mut corpus = corpus_with_pair();
        assert!(corpus.remove_speaker("SPK1"));
        assert!(!corpus.remove_speaker("SPK1"));
        assert_eq!(corpus.deleted_speaker_ids(), &["SPK1".to_string()]);
    }
}
