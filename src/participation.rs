//! Participation entity - a speaker's role in a communication
//!
//! A participation never owns its endpoints: it holds the communication and
//! speaker ids as keys into the corpus maps. Its own identity is derived from
//! those keys and is re-derived whenever an endpoint is renamed.

use crate::object::{CorpusObject, EntityType};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// Sentinel substituted for an endpoint id whose entity no longer exists in
/// the corpus. A stale participation stays inspectable and removable.
pub const DELETED_SENTINEL: &str = "(deleted)";

/// Build the composite participation identity from its endpoint ids.
pub fn derive_id(communication_id: &str, speaker_id: &str) -> String {
    format!("{}_x_{}", communication_id, speaker_id)
}

/// Links one speaker to one communication with a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    object: CorpusObject,
    communication_id: String,
    speaker_id: String,
    // endpoint ids the store last saw, the composite row locator
    original_communication_id: String,
    original_speaker_id: String,
    role: String,
}

impl Participation {
    pub fn new(
        communication_id: impl Into<String>,
        speaker_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        let communication_id = communication_id.into();
        let speaker_id = speaker_id.into();
        let id = derive_id(&communication_id, &speaker_id);
        Self {
            object: CorpusObject::new(EntityType::Participation, id),
            original_communication_id: communication_id.clone(),
            original_speaker_id: speaker_id.clone(),
            communication_id,
            speaker_id,
            role: role.into(),
        }
    }

    /// Reconstruct from a store row; starts clean
    pub(crate) fn from_store(
        communication_id: impl Into<String>,
        speaker_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        let communication_id = communication_id.into();
        let speaker_id = speaker_id.into();
        let id = derive_id(&communication_id, &speaker_id);
        Self {
            object: CorpusObject::from_store(EntityType::Participation, id),
            original_communication_id: communication_id.clone(),
            original_speaker_id: speaker_id.clone(),
            communication_id,
            speaker_id,
            role: role.into(),
        }
    }

    /// The derived composite identity `communicationID_x_speakerID`
    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn communication_id(&self) -> &str {
        &self.communication_id
    }

    pub fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    /// Endpoint ids the store last saw, used as the composite row locator
    pub fn original_endpoint_ids(&self) -> (&str, &str) {
        (&self.original_communication_id, &self.original_speaker_id)
    }

    /// Called by the corpus when a communication endpoint is renamed;
    /// re-derives the composite identity.
    pub(crate) fn set_communication_id(&mut self, communication_id: impl Into<String>) {
        let communication_id = communication_id.into();
        if self.communication_id != communication_id {
            self.communication_id = communication_id;
            self.rederive_id();
        }
    }

    /// Called by the corpus when a speaker endpoint is renamed.
    pub(crate) fn set_speaker_id(&mut self, speaker_id: impl Into<String>) {
        let speaker_id = speaker_id.into();
        if self.speaker_id != speaker_id {
            self.speaker_id = speaker_id;
            self.rederive_id();
        }
    }

    fn rederive_id(&mut self) {
        let id = derive_id(&self.communication_id, &self.speaker_id);
        self.object.set_id(id);
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn set_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        if self.role != role {
            self.role = role;
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

    /// Called after a successful save: re-anchors the composite row locator
    /// along with the lifecycle flags.
    pub(crate) fn mark_clean(&mut self) {
        self.original_communication_id = self.communication_id.clone();
        self.original_speaker_id = self.speaker_id.clone();
        self.object.mark_clean();
    }
}
