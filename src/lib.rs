//! # Corpusdb - Annotated speech corpus metadata engine
//!
//! Keeps an in-memory hierarchy of corpus metadata entities (corpus,
//! communication, speaker, recording, annotation, participation) consistent
//! with a backing SQLite store, under a user-editable attribute schema.
//!
//! Corpusdb provides:
//! - Entity lifecycle tracking (new/dirty/clean) on every metadata entity
//! - Aggregate consistency: rename cascades and pending-delete bookkeeping
//! - Schema-driven SQL generation from a live structure registry
//! - Transactional, retry-safe saves (all deletes first, parents before children)
//! - A repository facade with a uniform query filter and change notifications

pub mod annotation;
pub mod communication;
pub mod config;
pub mod corpus;
pub mod object;
pub mod participation;
pub mod query;
pub mod recording;
pub mod repository;
pub mod speaker;
pub mod storage;
pub mod structure;
pub mod value;

// Re-exports for convenient access
pub use annotation::Annotation;
pub use communication::Communication;
pub use corpus::Corpus;
pub use object::{CorpusObject, EntityType};
pub use participation::Participation;
pub use query::Selection;
pub use recording::Recording;
pub use repository::{CorpusEvent, CorpusObserver, Repository};
pub use speaker::Speaker;
pub use storage::SaveReport;
pub use structure::{AttributeDefinition, MetadataStructure};
pub use value::{AttributeValue, DataType};

/// Result type alias for Corpusdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Corpusdb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No corpus loaded")]
    NoCorpusLoaded,

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid datatype: {0}")]
    InvalidDataType(String),

    #[error("Invalid attribute id (must be a plain identifier): {0}")]
    InvalidAttributeId(String),
}
