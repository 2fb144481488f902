//! Relational schema - fixed tables and per-type column definitions
//!
//! Each persisted entity type has a fixed column set listed here; the live
//! structure registry appends its declared attribute columns after these, in
//! declaration order. Statement text is always built from the two lists
//! concatenated.

use crate::object::EntityType;

/// SQL to create the communication table
pub const CREATE_COMMUNICATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS communication (
    communicationID TEXT PRIMARY KEY,
    corpusID TEXT NOT NULL,
    communicationName TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the speaker table
pub const CREATE_SPEAKER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS speaker (
    speakerID TEXT PRIMARY KEY,
    corpusID TEXT NOT NULL,
    speakerName TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the recording table; duration is in nanoseconds
pub const CREATE_RECORDING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS recording (
    recordingID TEXT PRIMARY KEY,
    communicationID TEXT NOT NULL,
    recordingName TEXT NOT NULL DEFAULT '',
    filename TEXT NOT NULL DEFAULT '',
    format TEXT NOT NULL DEFAULT '',
    duration INTEGER NOT NULL DEFAULT 0,
    channels INTEGER NOT NULL DEFAULT 0,
    sampleRate INTEGER NOT NULL DEFAULT 0,
    precisionBits INTEGER NOT NULL DEFAULT 0,
    bitRate INTEGER NOT NULL DEFAULT 0,
    encoding TEXT NOT NULL DEFAULT '',
    fileSize INTEGER NOT NULL DEFAULT 0,
    checksumMD5 TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the annotation table
pub const CREATE_ANNOTATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS annotation (
    annotationID TEXT PRIMARY KEY,
    communicationID TEXT NOT NULL,
    recordingID TEXT NOT NULL DEFAULT '',
    annotationName TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the participation table; rows are keyed by the composite
/// (communicationID, speakerID)
pub const CREATE_PARTICIPATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participation (
    corpusID TEXT NOT NULL,
    communicationID TEXT NOT NULL,
    speakerID TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (communicationID, speakerID)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_communication_corpus ON communication(corpusID)",
    "CREATE INDEX IF NOT EXISTS idx_speaker_corpus ON speaker(corpusID)",
    "CREATE INDEX IF NOT EXISTS idx_recording_communication ON recording(communicationID)",
    "CREATE INDEX IF NOT EXISTS idx_annotation_communication ON annotation(communicationID)",
    "CREATE INDEX IF NOT EXISTS idx_participation_corpus ON participation(corpusID)",
    "CREATE INDEX IF NOT EXISTS idx_participation_speaker ON participation(speakerID)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_COMMUNICATION_TABLE,
        CREATE_SPEAKER_TABLE,
        CREATE_RECORDING_TABLE,
        CREATE_ANNOTATION_TABLE,
        CREATE_PARTICIPATION_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Fixed columns of the communication table, in schema order
pub const COMMUNICATION_COLUMNS: &[&str] = &["communicationID", "corpusID", "communicationName"];

/// Fixed columns of the speaker table
pub const SPEAKER_COLUMNS: &[&str] = &["speakerID", "corpusID", "speakerName"];

/// Fixed columns of the recording table
pub const RECORDING_COLUMNS: &[&str] = &[
    "recordingID",
    "communicationID",
    "recordingName",
    "filename",
    "format",
    "duration",
    "channels",
    "sampleRate",
    "precisionBits",
    "bitRate",
    "encoding",
    "fileSize",
    "checksumMD5",
];

/// Fixed columns of the annotation table
pub const ANNOTATION_COLUMNS: &[&str] =
    &["annotationID", "communicationID", "recordingID", "annotationName"];

/// Fixed columns of the participation table
pub const PARTICIPATION_COLUMNS: &[&str] = &["corpusID", "communicationID", "speakerID", "role"];

/// Entity types that own a table, with the table name
pub const PERSISTED_TYPES: &[(EntityType, &str)] = &[
    (EntityType::Communication, "communication"),
    (EntityType::Speaker, "speaker"),
    (EntityType::Recording, "recording"),
    (EntityType::Annotation, "annotation"),
    (EntityType::Participation, "participation"),
];

/// Table name for a persisted entity type
pub fn table_for(entity_type: EntityType) -> Option<&'static str> {
    PERSISTED_TYPES.iter().find(|(t, _)| *t == entity_type).map(|(_, table)| *table)
}

/// Fixed columns for a persisted entity type
pub fn fixed_columns(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Communication => COMMUNICATION_COLUMNS,
        EntityType::Speaker => SPEAKER_COLUMNS,
        EntityType::Recording => RECORDING_COLUMNS,
        EntityType::Annotation => ANNOTATION_COLUMNS,
        EntityType::Participation => PARTICIPATION_COLUMNS,
        _ => &[],
    }
}
