//! Storage Layer - SQLite-backed relational persistence
//!
//! System of record is SQLite with tables:
//! - communication(communicationID, corpusID, communicationName, ...)
//! - speaker(speakerID, corpusID, speakerName, ...)
//! - recording(recordingID, communicationID, recordingName, filename, format, duration, ...)
//! - annotation(annotationID, communicationID, recordingID, annotationName, ...)
//! - participation(corpusID, communicationID, speakerID, role, ...)
//!
//! The `...` columns are added at runtime from the structure registry's
//! declared attributes.

pub mod schema;
pub mod serializer;

pub use serializer::SaveReport;
