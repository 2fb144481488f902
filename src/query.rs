//! Selection - the uniform query filter consumed by every listing call
//!
//! Callers never need type-specific query shapes: one value filters any
//! listing along the corpus/communication/speaker/recording/annotation
//! dimensions, plus an attribute-id projection. An unset field means
//! unfiltered on that dimension.

use serde::{Deserialize, Serialize};

/// Filter value for listing/query operations on the repository facade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub corpus_id: Option<String>,
    pub communication_id: Option<String>,
    pub speaker_id: Option<String>,
    pub recording_id: Option<String>,
    pub annotation_id: Option<String>,
    /// Declared attribute ids a listing should project; empty = all declared
    pub attribute_ids: Vec<String>,
}

impl Selection {
    /// Unfiltered selection
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_corpus(mut self, corpus_id: impl Into<String>) -> Self {
        self.corpus_id = Some(corpus_id.into());
        self
    }

    pub fn with_communication(mut self, communication_id: impl Into<String>) -> Self {
        self.communication_id = Some(communication_id.into());
        self
    }

    pub fn with_speaker(mut self, speaker_id: impl Into<String>) -> Self {
        self.speaker_id = Some(speaker_id.into());
        self
    }

    pub fn with_recording(mut self, recording_id: impl Into<String>) -> Self {
        self.recording_id = Some(recording_id.into());
        self
    }

    pub fn with_annotation(mut self, annotation_id: impl Into<String>) -> Self {
        self.annotation_id = Some(annotation_id.into());
        self
    }

    pub fn with_attributes<I, S>(mut self, attribute_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_ids = attribute_ids.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn matches_corpus(&self, corpus_id: &str) -> bool {
        matches_dimension(&self.corpus_id, corpus_id)
    }

    pub(crate) fn matches_communication(&self, communication_id: &str) -> bool {
        matches_dimension(&self.communication_id, communication_id)
    }

    pub(crate) fn matches_speaker(&self, speaker_id: &str) -> bool {
        matches_dimension(&self.speaker_id, speaker_id)
    }

    pub(crate) fn matches_recording(&self, recording_id: &str) -> bool {
        matches_dimension(&self.recording_id, recording_id)
    }

    pub(crate) fn matches_annotation(&self, annotation_id: &str) -> bool {
        matches_dimension(&self.annotation_id, annotation_id)
    }

    /// Whether an attribute id survives the projection
    pub(crate) fn projects_attribute(&self, attribute_id: &str) -> bool {
        self.attribute_ids.is_empty() || self.attribute_ids.iter().any(|id| id == attribute_id)
    }
}

fn matches_dimension(filter: &Option<String>, value: &str) -> bool {
    match filter {
        // an empty string means unfiltered too, for callers building from text input
        Some(wanted) => wanted.is_empty() || wanted == value,
        None => true,
    }
}
