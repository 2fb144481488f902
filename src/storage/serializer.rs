//! Relational serializer - reconciles the corpus graph with the store
//!
//! Translates the graph's dirty/new flags and pending-delete lists into
//! parametrized statements and runs them inside one transaction per save.
//! Statement text is rebuilt on every call from the fixed columns plus the
//! registry's currently declared attributes; nothing is cached because the
//! registry is mutable at runtime.
//!
//! Failure policy: any statement error aborts the save, the transaction
//! rolls back, and no flag is cleared and no pending-delete list is drained,
//! so the call is always safe to retry.

use crate::annotation::Annotation;
use crate::communication::Communication;
use crate::corpus::Corpus;
use crate::object::{CorpusObject, EntityType};
use crate::participation::Participation;
use crate::recording::Recording;
use crate::speaker::Speaker;
use crate::structure::MetadataStructure;
use crate::value::AttributeValue;
use crate::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};

use super::schema;

/// Statement counts from one save call.
///
/// `deleted` counts rows removed, `inserted`/`updated` count rows written.
/// A fully clean graph reports all zeros and the save issued no statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl std::fmt::Display for SaveReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted",
            self.inserted, self.updated, self.deleted
        )
    }
}

/// Create the fixed tables and indexes
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    for stmt in schema::all_schema_statements() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// Bring the physical tables in line with the registry: add a column for
/// every declared attribute that does not exist yet. Columns of undeclared
/// attributes are left in place (their values simply stop being written).
pub fn apply_structure(conn: &Connection, structure: &MetadataStructure) -> Result<()> {
    for (entity_type, table) in schema::PERSISTED_TYPES {
        let existing = existing_columns(conn, table)?;
        for definition in structure.attributes_for(*entity_type) {
            validate_identifier(&definition.id)?;
            if existing.iter().any(|c| c.eq_ignore_ascii_case(&definition.id)) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table,
                definition.id,
                definition.data_type.sql_type()
            );
            conn.execute(&sql, [])?;
            tracing::debug!("added attribute column {}.{}", table, definition.id);
        }
    }
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Attribute ids become column names, so they must be plain identifiers
fn validate_identifier(id: &str) -> Result<()> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAttributeId(id.to_string()))
    }
}

// ========== Save ==========

/// Reconcile the corpus graph with the store inside one transaction.
///
/// Ordering: all deletes first, then parent rows before their children's
/// rows. Flags are cleared and pending-delete lists drained only after the
/// commit succeeds.
pub fn save_corpus(
    conn: &mut Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
) -> Result<SaveReport> {
    if corpus.is_fully_clean() {
        return Ok(SaveReport::default());
    }

    let result = run_save_transaction(conn, structure, corpus);
    match result {
        Ok(report) => {
            corpus.mark_stored();
            tracing::debug!(corpus = corpus.id(), %report, "corpus saved");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(corpus = corpus.id(), error = %e, "save failed, transaction rolled back");
            Err(e)
        }
    }
}

fn run_save_transaction(
    conn: &mut Connection,
    structure: &MetadataStructure,
    corpus: &Corpus,
) -> Result<SaveReport> {
    let mut report = SaveReport::default();
    // dropping the transaction without commit rolls everything back
    let tx = conn.transaction()?;

    // phase 1: all deletes
    for communication_id in corpus.deleted_communication_ids() {
        report.deleted +=
            tx.execute("DELETE FROM recording WHERE communicationID = ?1", [communication_id])?;
        report.deleted +=
            tx.execute("DELETE FROM annotation WHERE communicationID = ?1", [communication_id])?;
        report.deleted += tx
            .execute("DELETE FROM communication WHERE communicationID = ?1", [communication_id])?;
    }
    for speaker_id in corpus.deleted_speaker_ids() {
        report.deleted += tx.execute("DELETE FROM speaker WHERE speakerID = ?1", [speaker_id])?;
    }
    for (communication_id, speaker_id) in corpus.deleted_participation_ids() {
        report.deleted += tx.execute(
            "DELETE FROM participation WHERE communicationID = ?1 AND speakerID = ?2",
            [communication_id, speaker_id],
        )?;
    }
    for communication in corpus.communications() {
        for recording_id in communication.deleted_recording_ids() {
            report.deleted +=
                tx.execute("DELETE FROM recording WHERE recordingID = ?1", [recording_id])?;
        }
        for annotation_id in communication.deleted_annotation_ids() {
            report.deleted +=
                tx.execute("DELETE FROM annotation WHERE annotationID = ?1", [annotation_id])?;
        }
    }

    // phase 2: communications, each parent row before its children's rows
    for communication in corpus.communications() {
        if communication.object().is_dirty() {
            write_row(
                &tx,
                structure,
                communication.object(),
                communication_fixed_values(communication),
                &["communicationID"],
                vec![text(communication.object().original_id())],
                &mut report,
            )?;
        }
        for recording in communication.recordings() {
            if recording.object().is_dirty() {
                write_row(
                    &tx,
                    structure,
                    recording.object(),
                    recording_fixed_values(recording),
                    &["recordingID"],
                    vec![text(recording.object().original_id())],
                    &mut report,
                )?;
            }
        }
        for annotation in communication.annotations() {
            if annotation.object().is_dirty() {
                write_row(
                    &tx,
                    structure,
                    annotation.object(),
                    annotation_fixed_values(annotation),
                    &["annotationID"],
                    vec![text(annotation.object().original_id())],
                    &mut report,
                )?;
            }
        }
    }

    // phase 3: speakers, then participations (both endpoints' rows exist now)
    for speaker in corpus.speakers() {
        if speaker.object().is_dirty() {
            write_row(
                &tx,
                structure,
                speaker.object(),
                speaker_fixed_values(speaker),
                &["speakerID"],
                vec![text(speaker.object().original_id())],
                &mut report,
            )?;
        }
    }
    for participation in corpus.participations() {
        if participation.object().is_dirty() {
            let (original_com, original_spk) = participation.original_endpoint_ids();
            write_row(
                &tx,
                structure,
                participation.object(),
                participation_fixed_values(participation),
                &["communicationID", "speakerID"],
                vec![text(original_com), text(original_spk)],
                &mut report,
            )?;
        }
    }

    tx.commit()?;
    Ok(report)
}

/// INSERT when the entity is new, UPDATE (located by the original key
/// values) otherwise. Columns are the type's fixed columns plus every
/// attribute the registry currently declares for it, in declared order.
fn write_row(
    tx: &Transaction<'_>,
    structure: &MetadataStructure,
    object: &CorpusObject,
    mut values: Vec<Value>,
    key_columns: &[&str],
    key_values: Vec<Value>,
    report: &mut SaveReport,
) -> Result<()> {
    let entity_type = object.entity_type();
    let table = schema::table_for(entity_type)
        .ok_or_else(|| Error::UnknownEntityType(entity_type.to_string()))?;
    let fixed = schema::fixed_columns(entity_type);

    let mut columns: Vec<&str> = fixed.to_vec();
    for definition in structure.attributes_for(entity_type) {
        if fixed.iter().any(|c| c.eq_ignore_ascii_case(&definition.id)) {
            continue;
        }
        validate_identifier(&definition.id)?;
        columns.push(definition.id.as_str());
        values.push(
            object
                .attribute(&definition.id)
                .map(AttributeValue::to_sql_value)
                .unwrap_or(Value::Null),
        );
    }

    if object.is_new() {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&sql, params_from_iter(values.iter()))?;
        report.inserted += 1;
    } else {
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let conditions: Vec<String> = key_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, columns.len() + i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(", "),
            conditions.join(" AND ")
        );
        values.extend(key_values);
        tx.execute(&sql, params_from_iter(values.iter()))?;
        report.updated += 1;
    }
    Ok(())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn communication_fixed_values(communication: &Communication) -> Vec<Value> {
    vec![
        text(communication.id()),
        text(communication.corpus_id()),
        text(communication.name()),
    ]
}

fn speaker_fixed_values(speaker: &Speaker) -> Vec<Value> {
    vec![
        text(speaker.id()),
        text(speaker.object().corpus_id()),
        text(speaker.name()),
    ]
}

fn recording_fixed_values(recording: &Recording) -> Vec<Value> {
    vec![
        text(recording.id()),
        text(recording.communication_id()),
        text(recording.name()),
        text(recording.filename()),
        text(recording.format()),
        Value::Integer(recording.duration_ns()),
        Value::Integer(recording.channels()),
        Value::Integer(recording.sample_rate()),
        Value::Integer(recording.precision_bits()),
        Value::Integer(recording.bit_rate()),
        text(recording.encoding()),
        Value::Integer(recording.file_size()),
        text(recording.checksum_md5()),
    ]
}

fn annotation_fixed_values(annotation: &Annotation) -> Vec<Value> {
    vec![
        text(annotation.id()),
        text(annotation.communication_id()),
        text(annotation.recording_id()),
        text(annotation.name()),
    ]
}

fn participation_fixed_values(participation: &Participation) -> Vec<Value> {
    vec![
        text(participation.object().corpus_id()),
        text(participation.communication_id()),
        text(participation.speaker_id()),
        text(participation.role()),
    ]
}

// ========== Get ==========

/// Load the full object graph of one corpus.
///
/// Children are fetched in bulk (one query per table, filtered by corpus,
/// never one query per communication) and associated to their parents by
/// foreign key in memory. Every row read comes back clean.
pub fn get_corpus(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus_id: &str,
) -> Result<Corpus> {
    let mut corpus = Corpus::from_store(corpus_id);

    load_communications(conn, structure, &mut corpus, corpus_id)?;
    load_recordings(conn, structure, &mut corpus, corpus_id)?;
    load_annotations(conn, structure, &mut corpus, corpus_id)?;
    load_speakers(conn, structure, &mut corpus, corpus_id)?;
    load_participations(conn, structure, &mut corpus, corpus_id)?;

    // loading went through the normal add paths, which mark entities dirty
    corpus.mark_stored();
    Ok(corpus)
}

fn select_sql(
    structure: &MetadataStructure,
    entity_type: EntityType,
    table_alias: Option<&str>,
    from_clause: &str,
    where_clause: &str,
) -> (String, usize) {
    let fixed = schema::fixed_columns(entity_type);
    let mut columns: Vec<String> = Vec::with_capacity(fixed.len());
    let prefix = table_alias.map(|a| format!("{}.", a)).unwrap_or_default();
    for column in fixed {
        columns.push(format!("{}{}", prefix, column));
    }
    for definition in structure.attributes_for(entity_type) {
        if fixed.iter().any(|c| c.eq_ignore_ascii_case(&definition.id)) {
            continue;
        }
        columns.push(format!("{}{}", prefix, definition.id));
    }
    let sql = format!("SELECT {} FROM {} WHERE {}", columns.join(", "), from_clause, where_clause);
    (sql, fixed.len())
}

/// Read the declared-attribute columns (everything after the fixed ones)
/// into the entity's attribute map, guided by each declared datatype.
fn load_attributes(
    row: &rusqlite::Row<'_>,
    structure: &MetadataStructure,
    object: &mut CorpusObject,
    fixed_count: usize,
) -> Result<()> {
    let entity_type = object.entity_type();
    let fixed = schema::fixed_columns(entity_type);
    let mut index = fixed_count;
    for definition in structure.attributes_for(entity_type) {
        if fixed.iter().any(|c| c.eq_ignore_ascii_case(&definition.id)) {
            continue;
        }
        let value_ref = row.get_ref(index)?;
        if let Some(value) = AttributeValue::from_sql_ref(definition.data_type, value_ref)? {
            object.load_attribute(definition.id.clone(), value);
        }
        index += 1;
    }
    Ok(())
}

fn load_communications(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
    corpus_id: &str,
) -> Result<()> {
    let (sql, fixed_count) = select_sql(
        structure,
        EntityType::Communication,
        None,
        "communication",
        "corpusID = ?1 ORDER BY communicationID",
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([corpus_id])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let name: String = row.get(2)?;
        let mut communication = Communication::from_store(id, name);
        load_attributes(row, structure, communication.object_mut(), fixed_count)?;
        corpus.add_communication(communication);
    }
    Ok(())
}

fn load_recordings(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
    corpus_id: &str,
) -> Result<()> {
    let (sql, fixed_count) = select_sql(
        structure,
        EntityType::Recording,
        Some("r"),
        "recording r JOIN communication c ON r.communicationID = c.communicationID",
        "c.corpusID = ?1 ORDER BY r.recordingID",
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([corpus_id])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let communication_id: String = row.get(1)?;
        let mut recording = Recording::from_store(id, communication_id.clone());
        recording.set_name(row.get::<_, String>(2)?);
        recording.set_filename(row.get::<_, String>(3)?);
        recording.set_format(row.get::<_, String>(4)?);
        recording.set_duration_ns(row.get(5)?);
        recording.set_channels(row.get(6)?);
        recording.set_sample_rate(row.get(7)?);
        recording.set_precision_bits(row.get(8)?);
        recording.set_bit_rate(row.get(9)?);
        recording.set_encoding(row.get::<_, String>(10)?);
        recording.set_file_size(row.get(11)?);
        recording.set_checksum_md5(row.get::<_, String>(12)?);
        load_attributes(row, structure, recording.object_mut(), fixed_count)?;
        match corpus.communication_mut(&communication_id) {
            Some(communication) => communication.add_recording(recording),
            None => {
                tracing::warn!(
                    recording = recording.id(),
                    communication = %communication_id,
                    "recording row references a communication not in this corpus, skipping"
                );
            }
        }
    }
    Ok(())
}

fn load_annotations(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
    corpus_id: &str,
) -> Result<()> {
    let (sql, fixed_count) = select_sql(
        structure,
        EntityType::Annotation,
        Some("a"),
        "annotation a JOIN communication c ON a.communicationID = c.communicationID",
        "c.corpusID = ?1 ORDER BY a.annotationID",
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([corpus_id])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let communication_id: String = row.get(1)?;
        let mut annotation = Annotation::from_store(id, communication_id.clone());
        annotation.set_recording_id(row.get::<_, String>(2)?);
        annotation.set_name(row.get::<_, String>(3)?);
        load_attributes(row, structure, annotation.object_mut(), fixed_count)?;
        match corpus.communication_mut(&communication_id) {
            Some(communication) => communication.add_annotation(annotation),
            None => {
                tracing::warn!(
                    annotation = annotation.id(),
                    communication = %communication_id,
                    "annotation row references a communication not in this corpus, skipping"
                );
            }
        }
    }
    Ok(())
}

fn load_speakers(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
    corpus_id: &str,
) -> Result<()> {
    let (sql, fixed_count) = select_sql(
        structure,
        EntityType::Speaker,
        None,
        "speaker",
        "corpusID = ?1 ORDER BY speakerID",
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([corpus_id])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let name: String = row.get(2)?;
        let mut speaker = Speaker::from_store(id, name);
        load_attributes(row, structure, speaker.object_mut(), fixed_count)?;
        corpus.add_speaker(speaker);
    }
    Ok(())
}

fn load_participations(
    conn: &Connection,
    structure: &MetadataStructure,
    corpus: &mut Corpus,
    corpus_id: &str,
) -> Result<()> {
    let (sql, fixed_count) = select_sql(
        structure,
        EntityType::Participation,
        None,
        "participation",
        "corpusID = ?1 ORDER BY communicationID, speakerID",
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([corpus_id])?;
    while let Some(row) = rows.next()? {
        let communication_id: String = row.get(1)?;
        let speaker_id: String = row.get(2)?;
        let role: String = row.get(3)?;
        let mut participation = Participation::from_store(communication_id, speaker_id, role);
        participation.object_mut().set_corpus_id(corpus_id.to_string());
        load_attributes(row, structure, participation.object_mut(), fixed_count)?;
        corpus.insert_loaded_participation(participation);
    }
    Ok(())
}

/// Distinct corpus ids present in the store
pub fn list_corpora_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT corpusID FROM communication UNION SELECT corpusID FROM speaker ORDER BY corpusID",
    )?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::AttributeDefinition;
    use crate::value::DataType;

    fn open_store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_new_communication_saves_as_single_insert() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));

        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.deleted, 0);

        let communication = corpus.communication("COM1").unwrap();
        assert!(!communication.object().is_new());
        assert!(!communication.object().is_dirty());
    }

    #[test]
    fn test_clean_graph_saves_nothing() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_dirty_attribute_saves_as_single_update() {
        let mut conn = open_store();
        let mut structure = MetadataStructure::new();
        structure.declare(
            EntityType::Communication,
            AttributeDefinition::new("topic", "Topic", DataType::String),
        );
        apply_structure(&conn, &structure).unwrap();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        corpus.communication_mut("COM1").unwrap().set_attribute("topic", "news");
        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 0);

        let topic: String = conn
            .query_row("SELECT topic FROM communication WHERE communicationID = 'COM1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(topic, "news");
    }

    #[test]
    fn test_undeclared_attribute_is_not_persisted() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        let mut communication = Communication::new("COM1");
        communication.set_attribute("scratch", "kept in memory only");
        corpus.add_communication(communication);

        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        // value survives in memory, no column was ever created for it
        assert!(corpus.communication("COM1").unwrap().attribute("scratch").is_some());
        let columns = existing_columns(&conn, "communication").unwrap();
        assert!(!columns.iter().any(|c| c == "scratch"));
    }

    #[test]
    fn test_speaker_and_participation_insert() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        corpus.add_speaker(Speaker::new("SPK1"));
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        corpus.add_participation("COM1", "SPK1", "interviewer").unwrap();
        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.inserted, 1);

        let role: String = conn
            .query_row(
                "SELECT role FROM participation WHERE communicationID = 'COM1' AND speakerID = 'SPK1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(role, "interviewer");
    }

    #[test]
    fn test_cascade_delete_ordering_and_drain() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        let mut communication = Communication::new("COM1");
        communication.add_recording(Recording::new("REC1"));
        communication.add_recording(Recording::new("REC2"));
        communication.add_annotation(Annotation::new("ANN1"));
        corpus.add_communication(communication);
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM recording"), 2);

        corpus.remove_communication("COM1");
        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        // two recordings + one annotation + the communication row
        assert_eq!(report.deleted, 4);
        assert!(corpus.deleted_communication_ids().is_empty());
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM recording"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM annotation"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM communication"), 0);
    }

    #[test]
    fn test_delete_runs_before_insert_on_id_reuse() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        // reuse the id within one save: the INSERT only satisfies the
        // primary key because the pending delete commits in the same
        // transaction ahead of it
        corpus.remove_communication("COM1");
        let mut replacement = Communication::new("COM1");
        replacement.set_name("second take");
        corpus.add_communication(replacement);

        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM communication"), 1);

        let name: String = conn
            .query_row(
                "SELECT communicationName FROM communication WHERE communicationID = 'COM1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(name, "second take");
    }

    #[test]
    fn test_failed_save_rolls_back_and_stays_retryable() {
        let mut conn = open_store();
        let mut structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        let mut communication = Communication::new("COM1");
        communication.add_recording(Recording::new("REC1"));
        corpus.add_communication(communication);
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        // make the next save fail: declare an attribute without a column
        structure.declare(
            EntityType::Communication,
            AttributeDefinition::new("missing_column", "Missing", DataType::String),
        );
        corpus.remove_communication("COM1");
        corpus.add_communication(Communication::new("COM2"));

        let result = save_corpus(&mut conn, &structure, &mut corpus);
        assert!(result.is_err());

        // nothing committed: old rows still there, new row absent
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM communication"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM recording"), 1);

        // pending state untouched, so the save is retryable once fixed
        assert_eq!(corpus.deleted_communication_ids(), &["COM1".to_string()]);
        assert!(corpus.communication("COM2").unwrap().object().is_new());

        apply_structure(&conn, &structure).unwrap();
        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.deleted, 2);
        assert!(corpus.deleted_communication_ids().is_empty());
    }

    #[test]
    fn test_rename_updates_row_in_place() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        let mut corpus = Corpus::new("C1");
        corpus.add_communication(Communication::new("COM1"));
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        corpus.rename_communication("COM1", "COM9");
        let report = save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM communication"), 1);

        let id: String =
            conn.query_row("SELECT communicationID FROM communication", [], |r| r.get(0)).unwrap();
        assert_eq!(id, "COM9");
    }

    #[test]
    fn test_roundtrip_through_store() {
        let mut conn = open_store();
        let mut structure = MetadataStructure::new();
        structure.declare(
            EntityType::Speaker,
            AttributeDefinition::new("year_of_birth", "Year of birth", DataType::Int),
        );
        apply_structure(&conn, &structure).unwrap();

        let mut corpus = Corpus::new("C1");
        let mut communication = Communication::new("COM1");
        communication.set_name("Morning interview");
        let mut recording = Recording::new("REC1");
        recording.set_filename("com1.wav");
        recording.set_sample_rate(44_100);
        recording.set_duration_ns(90_000_000_000);
        communication.add_recording(recording);
        let mut annotation = Annotation::new("ANN1");
        annotation.set_recording_id("REC1");
        communication.add_annotation(annotation);
        corpus.add_communication(communication);
        let mut speaker = Speaker::new("SPK1");
        speaker.set_name("Alex");
        speaker.set_attribute("year_of_birth", 1979i64);
        corpus.add_speaker(speaker);
        corpus.add_participation("COM1", "SPK1", "interviewee").unwrap();
        save_corpus(&mut conn, &structure, &mut corpus).unwrap();

        let loaded = get_corpus(&conn, &structure, "C1").unwrap();
        assert!(loaded.is_fully_clean());
        let communication = loaded.communication("COM1").unwrap();
        assert_eq!(communication.name(), "Morning interview");
        let recording = communication.recording("REC1").unwrap();
        assert_eq!(recording.sample_rate(), 44_100);
        assert_eq!(recording.duration_ns(), 90_000_000_000);
        assert_eq!(communication.annotation("ANN1").unwrap().recording_id(), "REC1");
        let speaker = loaded.speaker("SPK1").unwrap();
        assert_eq!(speaker.attribute("year_of_birth").unwrap().as_int(), Some(1979));
        let participation = loaded.participation("COM1", "SPK1").unwrap();
        assert_eq!(participation.role(), "interviewee");
    }

    #[test]
    fn test_list_corpora_ids() {
        let mut conn = open_store();
        let structure = MetadataStructure::new();

        for corpus_id in ["C2", "C1"] {
            let mut corpus = Corpus::new(corpus_id);
            corpus.add_communication(Communication::new(format!("{}-COM", corpus_id)));
            save_corpus(&mut conn, &structure, &mut corpus).unwrap();
        }
        let mut only_speakers = Corpus::new("C3");
        only_speakers.add_speaker(Speaker::new("SPK1"));
        save_corpus(&mut conn, &structure, &mut only_speakers).unwrap();

        assert_eq!(list_corpora_ids(&conn).unwrap(), ["C1", "C2", "C3"]);
    }
}
