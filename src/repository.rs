//! Repository facade - the single surface other subsystems call
//!
//! Owns the SQLite connection, the structure registry, the loaded corpus,
//! and the observer list. Every collaborator receives a repository reference
//! explicitly; nothing is looked up from global state. Serializer internals
//! never leak past this module.
//!
//! One repository means one connection and one writer: calls are synchronous
//! and blocking, and callers that share a repository across threads must
//! serialize access themselves.

use crate::communication::Communication;
use crate::corpus::Corpus;
use crate::object::EntityType;
use crate::participation::Participation;
use crate::query::Selection;
use crate::recording::Recording;
use crate::speaker::Speaker;
use crate::storage::serializer;
use crate::storage::SaveReport;
use crate::structure::MetadataStructure;
use crate::value::AttributeValue;
use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;

/// Change notification emitted by repository mutation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusEvent {
    Added { entity_type: EntityType, id: String },
    Removed { entity_type: EntityType, id: String },
    Renamed { entity_type: EntityType, old_id: String, new_id: String },
}

/// Observer registered on the repository; called synchronously after each
/// graph mutation, before the change is persisted.
pub trait CorpusObserver {
    fn on_event(&self, event: &CorpusEvent);
}

impl<F: Fn(&CorpusEvent)> CorpusObserver for F {
    fn on_event(&self, event: &CorpusEvent) {
        self(event)
    }
}

/// Owns one connection, one registry, and at most one loaded corpus.
pub struct Repository {
    conn: Connection,
    structure: MetadataStructure,
    corpus: Option<Corpus>,
    observers: Vec<Box<dyn CorpusObserver>>,
}

impl Repository {
    /// Open a database file (creates it and the schema if needed)
    pub fn open(path: &Path, structure: MetadataStructure) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, structure)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(structure: MetadataStructure) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, structure)
    }

    fn with_connection(conn: Connection, structure: MetadataStructure) -> Result<Self> {
        serializer::ensure_schema(&conn)?;
        serializer::apply_structure(&conn, &structure)?;
        Ok(Self { conn, structure, corpus: None, observers: Vec::new() })
    }

    // ========== Structure registry ==========

    pub fn structure(&self) -> &MetadataStructure {
        &self.structure
    }

    /// Replace the registry and bring the physical tables in line with it.
    /// Subsequent saves/gets use the new declarations immediately.
    pub fn set_structure(&mut self, structure: MetadataStructure) -> Result<()> {
        serializer::apply_structure(&self.conn, &structure)?;
        self.structure = structure;
        Ok(())
    }

    // ========== Corpus lifecycle ==========

    /// Create a fresh, unpersisted corpus and make it the active one
    pub fn create_corpus(&mut self, corpus_id: impl Into<String>) -> &mut Corpus {
        self.corpus.insert(Corpus::new(corpus_id))
    }

    /// Load a corpus from the store and make it the active one
    pub fn open_corpus(&mut self, corpus_id: &str) -> Result<&Corpus> {
        let corpus = serializer::get_corpus(&self.conn, &self.structure, corpus_id)?;
        Ok(self.corpus.insert(corpus))
    }

    /// Persist the active corpus. Returns the statement counts; on error the
    /// transaction has been rolled back and the graph is untouched.
    pub fn save(&mut self) -> Result<SaveReport> {
        let corpus = self.corpus.as_mut().ok_or(Error::NoCorpusLoaded)?;
        serializer::save_corpus(&mut self.conn, &self.structure, corpus)
    }

    /// Distinct corpus ids present in the store
    pub fn list_corpora_ids(&self) -> Result<Vec<String>> {
        serializer::list_corpora_ids(&self.conn)
    }

    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    pub fn corpus_mut(&mut self) -> Option<&mut Corpus> {
        self.corpus.as_mut()
    }

    fn active_corpus(&self) -> Result<&Corpus> {
        self.corpus.as_ref().ok_or(Error::NoCorpusLoaded)
    }

    fn active_corpus_mut(&mut self) -> Result<&mut Corpus> {
        self.corpus.as_mut().ok_or(Error::NoCorpusLoaded)
    }

    // ========== Observers ==========

    /// Register an observer for added/removed/renamed notifications
    pub fn subscribe(&mut self, observer: Box<dyn CorpusObserver>) {
        self.observers.push(observer);
    }

    fn notify(&self, event: CorpusEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    // ========== Mutation operations (graph only; persist via save) ==========

    pub fn add_communication(&mut self, communication: Communication) -> Result<()> {
        let id = communication.id().to_string();
        self.active_corpus_mut()?.add_communication(communication);
        self.notify(CorpusEvent::Added { entity_type: EntityType::Communication, id });
        Ok(())
    }

    pub fn remove_communication(&mut self, id: &str) -> Result<bool> {
        let removed = self.active_corpus_mut()?.remove_communication(id);
        if removed {
            self.notify(CorpusEvent::Removed {
                entity_type: EntityType::Communication,
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn rename_communication(&mut self, old_id: &str, new_id: &str) -> Result<bool> {
        let renamed = self.active_corpus_mut()?.rename_communication(old_id, new_id);
        if renamed {
            self.notify(CorpusEvent::Renamed {
                entity_type: EntityType::Communication,
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            });
        }
        Ok(renamed)
    }

    pub fn add_speaker(&mut self, speaker: Speaker) -> Result<()> {
        let id = speaker.id().to_string();
        self.active_corpus_mut()?.add_speaker(speaker);
        self.notify(CorpusEvent::Added { entity_type: EntityType::Speaker, id });
        Ok(())
    }

    pub fn remove_speaker(&mut self, id: &str) -> Result<bool> {
        let removed = self.active_corpus_mut()?.remove_speaker(id);
        if removed {
            self.notify(CorpusEvent::Removed {
                entity_type: EntityType::Speaker,
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn rename_speaker(&mut self, old_id: &str, new_id: &str) -> Result<bool> {
        let renamed = self.active_corpus_mut()?.rename_speaker(old_id, new_id);
        if renamed {
            self.notify(CorpusEvent::Renamed {
                entity_type: EntityType::Speaker,
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            });
        }
        Ok(renamed)
    }

    /// Add a recording to a communication. Returns false when the
    /// communication is absent from the active corpus.
    pub fn add_recording(&mut self, communication_id: &str, recording: Recording) -> Result<bool> {
        let id = recording.id().to_string();
        match self.active_corpus_mut()?.communication_mut(communication_id) {
            Some(communication) => {
                communication.add_recording(recording);
                self.notify(CorpusEvent::Added { entity_type: EntityType::Recording, id });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_recording(&mut self, communication_id: &str, id: &str) -> Result<bool> {
        let removed = self
            .active_corpus_mut()?
            .communication_mut(communication_id)
            .is_some_and(|c| c.remove_recording(id));
        if removed {
            self.notify(CorpusEvent::Removed {
                entity_type: EntityType::Recording,
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn rename_recording(
        &mut self,
        communication_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<bool> {
        let renamed = self
            .active_corpus_mut()?
            .communication_mut(communication_id)
            .is_some_and(|c| c.rename_recording(old_id, new_id));
        if renamed {
            self.notify(CorpusEvent::Renamed {
                entity_type: EntityType::Recording,
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            });
        }
        Ok(renamed)
    }

    /// Add an annotation to a communication. Returns false when the
    /// communication is absent from the active corpus.
    pub fn add_annotation(
        &mut self,
        communication_id: &str,
        annotation: crate::annotation::Annotation,
    ) -> Result<bool> {
        let id = annotation.id().to_string();
        match self.active_corpus_mut()?.communication_mut(communication_id) {
            Some(communication) => {
                communication.add_annotation(annotation);
                self.notify(CorpusEvent::Added { entity_type: EntityType::Annotation, id });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_annotation(&mut self, communication_id: &str, id: &str) -> Result<bool> {
        let removed = self
            .active_corpus_mut()?
            .communication_mut(communication_id)
            .is_some_and(|c| c.remove_annotation(id));
        if removed {
            self.notify(CorpusEvent::Removed {
                entity_type: EntityType::Annotation,
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn rename_annotation(
        &mut self,
        communication_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<bool> {
        let renamed = self
            .active_corpus_mut()?
            .communication_mut(communication_id)
            .is_some_and(|c| c.rename_annotation(old_id, new_id));
        if renamed {
            self.notify(CorpusEvent::Renamed {
                entity_type: EntityType::Annotation,
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            });
        }
        Ok(renamed)
    }

    /// Link a speaker to a communication. Returns false when either endpoint
    /// is absent from the active corpus.
    pub fn add_participation(
        &mut self,
        communication_id: &str,
        speaker_id: &str,
        role: &str,
    ) -> Result<bool> {
        let added = self
            .active_corpus_mut()?
            .add_participation(communication_id, speaker_id, role)
            .map(|p| p.id().to_string());
        match added {
            Some(id) => {
                self.notify(CorpusEvent::Added { entity_type: EntityType::Participation, id });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_participation(&mut self, communication_id: &str, speaker_id: &str) -> Result<bool> {
        let removed = self.active_corpus_mut()?.remove_participation(communication_id, speaker_id);
        if removed {
            self.notify(CorpusEvent::Removed {
                entity_type: EntityType::Participation,
                id: crate::participation::derive_id(communication_id, speaker_id),
            });
        }
        Ok(removed)
    }

    // ========== Entity accessors ==========

    pub fn communication(&self, id: &str) -> Option<&Communication> {
        self.corpus.as_ref().and_then(|c| c.communication(id))
    }

    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.corpus.as_ref().and_then(|c| c.speaker(id))
    }

    pub fn recording(&self, id: &str) -> Option<&Recording> {
        self.corpus
            .as_ref()?
            .communications()
            .find_map(|communication| communication.recording(id))
    }

    pub fn annotation(&self, id: &str) -> Option<&crate::annotation::Annotation> {
        self.corpus
            .as_ref()?
            .communications()
            .find_map(|communication| communication.annotation(id))
    }

    pub fn participation(&self, communication_id: &str, speaker_id: &str) -> Option<&Participation> {
        self.corpus.as_ref().and_then(|c| c.participation(communication_id, speaker_id))
    }

    // ========== Selection-filtered listings ==========

    /// Communications of the active corpus matching the selection
    pub fn communications(&self, selection: &Selection) -> Result<Vec<&Communication>> {
        let corpus = self.active_corpus()?;
        if !selection.matches_corpus(corpus.id()) {
            return Ok(Vec::new());
        }
        Ok(corpus
            .communications()
            .filter(|c| selection.matches_communication(c.id()))
            .collect())
    }

    /// Speakers of the active corpus matching the selection
    pub fn speakers(&self, selection: &Selection) -> Result<Vec<&Speaker>> {
        let corpus = self.active_corpus()?;
        if !selection.matches_corpus(corpus.id()) {
            return Ok(Vec::new());
        }
        Ok(corpus.speakers().filter(|s| selection.matches_speaker(s.id())).collect())
    }

    /// Recordings matching the selection, across the corpus or one
    /// communication
    pub fn recordings(&self, selection: &Selection) -> Result<Vec<&Recording>> {
        let corpus = self.active_corpus()?;
        if !selection.matches_corpus(corpus.id()) {
            return Ok(Vec::new());
        }
        Ok(corpus
            .communications()
            .filter(|c| selection.matches_communication(c.id()))
            .flat_map(|c| c.recordings())
            .filter(|r| selection.matches_recording(r.id()))
            .collect())
    }

    /// Annotations matching the selection
    pub fn annotations(&self, selection: &Selection) -> Result<Vec<&crate::annotation::Annotation>> {
        let corpus = self.active_corpus()?;
        if !selection.matches_corpus(corpus.id()) {
            return Ok(Vec::new());
        }
        Ok(corpus
            .communications()
            .filter(|c| selection.matches_communication(c.id()))
            .flat_map(|c| c.annotations())
            .filter(|a| {
                selection.matches_annotation(a.id())
                    && selection.matches_recording(a.recording_id())
            })
            .collect())
    }

    /// Participations matching the selection
    pub fn participations(&self, selection: &Selection) -> Result<Vec<&Participation>> {
        let corpus = self.active_corpus()?;
        if !selection.matches_corpus(corpus.id()) {
            return Ok(Vec::new());
        }
        Ok(corpus
            .participations()
            .filter(|p| {
                selection.matches_communication(p.communication_id())
                    && selection.matches_speaker(p.speaker_id())
            })
            .collect())
    }

    /// Declared attribute values of one entity, projected through the
    /// selection's `attribute_ids`.
    pub fn metadata(
        &self,
        entity_type: EntityType,
        id: &str,
        selection: &Selection,
    ) -> Result<Vec<(String, Option<AttributeValue>)>> {
        let corpus = self.active_corpus()?;
        let object = match entity_type {
            EntityType::Communication => corpus.communication(id).map(|c| c.object()),
            EntityType::Speaker => corpus.speaker(id).map(|s| s.object()),
            EntityType::Recording => corpus
                .communications()
                .find_map(|c| c.recording(id))
                .map(|r| r.object()),
            EntityType::Annotation => corpus
                .communications()
                .find_map(|c| c.annotation(id))
                .map(|a| a.object()),
            // keyed by the derived composite id
            EntityType::Participation => corpus
                .participations()
                .find(|p| p.id() == id)
                .map(|p| p.object()),
            _ => None,
        };
        let object = object.ok_or_else(|| Error::EntityNotFound(format!("{}:{}", entity_type, id)))?;

        Ok(self
            .structure
            .attributes_for(entity_type)
            .iter()
            .filter(|d| selection.projects_attribute(&d.id))
            .map(|d| (d.id.clone(), object.attribute(&d.id).cloned()))
            .collect())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("corpus", &self.corpus.as_ref().map(|c| c.id()))
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn repository() -> Repository {
        Repository::open_in_memory(MetadataStructure::new()).unwrap()
    }

    #[test]
    fn test_mutations_require_a_corpus() {
        let mut repo = repository();
        assert!(matches!(repo.save(), Err(Error::NoCorpusLoaded)));
        assert!(matches!(
            repo.add_communication(Communication::new("COM1")),
            Err(Error::NoCorpusLoaded)
        ));
    }

    #[test]
    fn test_save_and_reopen() {
        let mut repo = repository();
        repo.create_corpus("C1");
        repo.add_communication(Communication::new("COM1")).unwrap();
        repo.add_speaker(Speaker::new("SPK1")).unwrap();
        assert!(repo.add_participation("COM1", "SPK1", "interviewer").unwrap());

        let report = repo.save().unwrap();
        assert_eq!(report.inserted, 3);

        repo.open_corpus("C1").unwrap();
        assert!(repo.communication("COM1").is_some());
        assert_eq!(repo.participation("COM1", "SPK1").unwrap().role(), "interviewer");
        assert_eq!(repo.list_corpora_ids().unwrap(), ["C1"]);
    }

    #[test]
    fn test_observer_receives_mutation_events() {
        let events: Rc<RefCell<Vec<CorpusEvent>>> = Rc::default();
        let sink = events.clone();

        let mut repo = repository();
        repo.create_corpus("C1");
        repo.subscribe(Box::new(move |event: &CorpusEvent| {
            sink.borrow_mut().push(event.clone());
        }));

        repo.add_communication(Communication::new("COM1")).unwrap();
        repo.rename_communication("COM1", "COM2").unwrap();
        repo.remove_communication("COM2").unwrap();

        let seen = events.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0],
            CorpusEvent::Added { entity_type: EntityType::Communication, id: "COM1".into() }
        );
        assert!(matches!(seen[1], CorpusEvent::Renamed { .. }));
        assert!(matches!(seen[2], CorpusEvent::Removed { .. }));
    }

    #[test]
    fn test_no_event_for_failed_mutation() {
        let events: Rc<RefCell<Vec<CorpusEvent>>> = Rc::default();
        let sink = events.clone();

        let mut repo = repository();
        repo.create_corpus("C1");
        repo.subscribe(Box::new(move |event: &CorpusEvent| {
            sink.borrow_mut().push(event.clone());
        }));

        assert!(!repo.remove_communication("ABSENT").unwrap());
        assert!(!repo.add_participation("COM1", "SPK1", "x").unwrap());
        assert!(!repo.add_recording("ABSENT", Recording::new("REC1")).unwrap());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_child_mutations_through_facade() {
        let mut repo = repository();
        repo.create_corpus("C1");
        repo.add_communication(Communication::new("COM1")).unwrap();

        assert!(repo.add_recording("COM1", Recording::new("REC1")).unwrap());
        assert!(repo.rename_recording("COM1", "REC1", "REC1-take2").unwrap());
        assert!(repo.recording("REC1-take2").is_some());
        assert!(repo.remove_recording("COM1", "REC1-take2").unwrap());
        assert!(repo.recording("REC1-take2").is_none());

        assert!(repo.add_annotation("COM1", crate::annotation::Annotation::new("ANN1")).unwrap());
        assert!(repo.annotation("ANN1").is_some());
        assert!(!repo.remove_annotation("COM1", "ABSENT").unwrap());
    }

    #[test]
    fn test_selection_filtered_listing() {
        let mut repo = repository();
        repo.create_corpus("C1");
        let mut com1 = Communication::new("COM1");
        com1.add_recording(Recording::new("REC1"));
        repo.add_communication(com1).unwrap();
        let mut com2 = Communication::new("COM2");
        com2.add_recording(Recording::new("REC2"));
        com2.add_recording(Recording::new("REC3"));
        repo.add_communication(com2).unwrap();

        let all = repo.recordings(&Selection::all()).unwrap();
        assert_eq!(all.len(), 3);

        let one = repo.recordings(&Selection::all().with_communication("COM2")).unwrap();
        assert_eq!(one.len(), 2);

        let other_corpus = repo.recordings(&Selection::all().with_corpus("C9")).unwrap();
        assert!(other_corpus.is_empty());
    }

    #[test]
    fn test_metadata_projection() {
        use crate::structure::AttributeDefinition;
        use crate::value::DataType;

        let mut structure = MetadataStructure::new();
        structure.declare(
            EntityType::Communication,
            AttributeDefinition::new("topic", "Topic", DataType::String),
        );
        structure.declare(
            EntityType::Communication,
            AttributeDefinition::new("channel", "Channel", DataType::String),
        );
        let mut repo = Repository::open_in_memory(structure).unwrap();
        repo.create_corpus("C1");
        let mut communication = Communication::new("COM1");
        communication.set_attribute("topic", "news");
        repo.add_communication(communication).unwrap();

        let all = repo
            .metadata(EntityType::Communication, "COM1", &Selection::all())
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "topic");
        assert_eq!(all[0].1.as_ref().and_then(|v| v.as_str().map(String::from)), Some("news".into()));
        assert!(all[1].1.is_none());

        let projected = repo
            .metadata(
                EntityType::Communication,
                "COM1",
                &Selection::all().with_attributes(["channel"]),
            )
            .unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].0, "channel");
    }

    #[test]
    fn test_metadata_for_participation() {
        use crate::structure::AttributeDefinition;
        use crate::value::DataType;

        let mut structure = MetadataStructure::new();
        structure.declare(
            EntityType::Participation,
            AttributeDefinition::new("fluency", "Fluency", DataType::String),
        );
        let mut repo = Repository::open_in_memory(structure).unwrap();
        repo.create_corpus("C1");
        repo.add_communication(Communication::new("COM1")).unwrap();
        repo.add_speaker(Speaker::new("SPK1")).unwrap();
        assert!(repo.add_participation("COM1", "SPK1", "interviewee").unwrap());
        repo.corpus_mut()
            .unwrap()
            .participation_mut("COM1", "SPK1")
            .unwrap()
            .set_attribute("fluency", "native");

        let values = repo
            .metadata(EntityType::Participation, "COM1_x_SPK1", &Selection::all())
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "fluency");
        assert_eq!(values[0].1.as_ref().and_then(|v| v.as_str()), Some("native"));

        assert!(matches!(
            repo.metadata(EntityType::Participation, "COM1_x_NOBODY", &Selection::all()),
            Err(Error::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = crate::config::default_database_path_in(dir.path());
        crate::config::ensure_db_dir(&db_path).unwrap();

        let mut repo = Repository::open(&db_path, MetadataStructure::new()).unwrap();
        repo.create_corpus("C1");
        repo.add_communication(Communication::new("COM1")).unwrap();
        repo.add_speaker(Speaker::new("SPK1")).unwrap();
        repo.save().unwrap();
        drop(repo);
        assert!(db_path.exists());

        let mut reopened = Repository::open(&db_path, MetadataStructure::new()).unwrap();
        reopened.open_corpus("C1").unwrap();
        assert!(reopened.communication("COM1").is_some());
        assert!(reopened.speaker("SPK1").is_some());
    }
}
