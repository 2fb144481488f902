//! Corpusdb CLI - inspect and manage annotated speech corpus databases

use clap::{Parser, Subcommand};
use corpusdb::repository::Repository;
use corpusdb::structure::MetadataStructure;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "corpusdb")]
#[command(version = "0.1.0")]
#[command(about = "Annotated speech corpus metadata engine")]
#[command(long_about = r#"
Corpusdb manages the metadata layer of annotated speech corpora:
communications, speakers, recordings, annotations, and the participations
linking speakers to communications.

Example usage:
  corpusdb init
  corpusdb corpora
  corpusdb show --corpus my-corpus
  corpusdb stats --corpus my-corpus
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the database file (overrides corpusdb.toml)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a corpusdb.toml and an empty database in the current directory
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// List the corpora present in the database
    Corpora,

    /// Show the object graph of one corpus
    Show {
        /// Corpus id
        #[arg(short, long)]
        corpus: String,

        /// Emit the full object graph as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Print entity counts for one corpus
    Stats {
        /// Corpus id
        #[arg(short, long)]
        corpus: String,
    },
}

#[derive(Tabled)]
struct CommunicationRow {
    #[tabled(rename = "Communication")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Recordings")]
    recordings: usize,
    #[tabled(rename = "Annotations")]
    annotations: usize,
}

#[derive(Tabled)]
struct SpeakerRow {
    #[tabled(rename = "Speaker")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Participations")]
    participations: usize,
}

#[derive(Tabled)]
struct ParticipationRow {
    #[tabled(rename = "Communication")]
    communication: String,
    #[tabled(rename = "Speaker")]
    speaker: String,
    #[tabled(rename = "Role")]
    role: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("corpusdb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("corpusdb=warn"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match cli.command {
        Commands::Init { force } => init(cli.database, force),
        Commands::Corpora => corpora(cli.database),
        Commands::Show { corpus, json } => show(cli.database, &corpus, json),
        Commands::Stats { corpus } => stats(cli.database, &corpus),
    }
}

/// Resolve the database path: CLI flag, then corpusdb.toml, then the default
fn resolve_database(database: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = database {
        return Ok(path);
    }
    if let Some(config) = corpusdb::config::load_config(None)? {
        if let Some(db) = config.database {
            return Ok(PathBuf::from(db));
        }
    }
    Ok(corpusdb::config::default_database_path_in(&std::env::current_dir()?))
}

fn open_repository(database: Option<PathBuf>) -> anyhow::Result<Repository> {
    let db_path = resolve_database(database)?;
    if !db_path.exists() {
        anyhow::bail!("database not found at {} (run `corpusdb init` first)", db_path.display());
    }
    Ok(Repository::open(&db_path, MetadataStructure::new())?)
}

fn init(database: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let db_path = resolve_database(database)?;
    corpusdb::config::ensure_db_dir(&db_path)?;

    let config = corpusdb::config::CorpusdbConfig {
        database: Some(db_path.display().to_string()),
        corpus: None,
    };
    corpusdb::config::write_config(&corpusdb::config::default_config_path(), &config, force)?;

    // opening creates the file and the schema
    Repository::open(&db_path, MetadataStructure::new())?;
    println!("Initialized corpus database at {}", db_path.display());
    Ok(())
}

fn corpora(database: Option<PathBuf>) -> anyhow::Result<()> {
    let repo = open_repository(database)?;
    let ids = repo.list_corpora_ids()?;
    if ids.is_empty() {
        println!("No corpora in the database.");
        return Ok(());
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn show(database: Option<PathBuf>, corpus_id: &str, json: bool) -> anyhow::Result<()> {
    let mut repo = open_repository(database)?;
    let corpus = repo.open_corpus(corpus_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(corpus)?);
        return Ok(());
    }

    let communications: Vec<CommunicationRow> = corpus
        .communications()
        .map(|c| CommunicationRow {
            id: c.id().to_string(),
            name: c.name().to_string(),
            recordings: c.recording_count(),
            annotations: c.annotation_count(),
        })
        .collect();
    let speakers: Vec<SpeakerRow> = corpus
        .speakers()
        .map(|s| SpeakerRow {
            id: s.id().to_string(),
            name: s.name().to_string(),
            participations: corpus.participations_for_speaker(s.id()).len(),
        })
        .collect();
    let participations: Vec<ParticipationRow> = corpus
        .participations()
        .map(|p| ParticipationRow {
            communication: p.communication_id().to_string(),
            speaker: p.speaker_id().to_string(),
            role: p.role().to_string(),
        })
        .collect();

    println!("Corpus: {}", corpus.id());
    if communications.is_empty() {
        println!("  (no communications)");
    } else {
        println!("{}", Table::new(communications));
    }
    if !speakers.is_empty() {
        println!("{}", Table::new(speakers));
    }
    if !participations.is_empty() {
        println!("{}", Table::new(participations));
    }
    Ok(())
}

fn stats(database: Option<PathBuf>, corpus_id: &str) -> anyhow::Result<()> {
    let mut repo = open_repository(database)?;
    let corpus = repo.open_corpus(corpus_id)?;

    let recordings: usize = corpus.communications().map(|c| c.recording_count()).sum();
    let annotations: usize = corpus.communications().map(|c| c.annotation_count()).sum();

    println!("Corpus: {}", corpus.id());
    println!("  Communications: {}", corpus.communication_count());
    println!("  Speakers: {}", corpus.speaker_count());
    println!("  Recordings: {}", recordings);
    println!("  Annotations: {}", annotations);
    println!("  Participations: {}", corpus.participation_count());
    Ok(())
}
