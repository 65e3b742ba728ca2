//! CloudNote command-line host.
//!
//! # Responsibility
//! - Drive the documents model against the configured record store.
//! - Act as the notification context owner by draining it on the main thread.

use clap::{Parser, Subcommand};
use cloudnote_core::{
    init_logging_from_config, open_store, CoreConfig, Document, DocumentsModel,
    DocumentsObserver, QueueContext, StoreBackend, StoreError,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// cloudnote - plain-text documents synced with a record store
#[derive(Debug, Parser)]
#[command(name = "cloudnote")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite store file; overrides the configured backend
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage info
    Ping,
    /// List documents
    List,
    /// Create a document
    Add { title: String, content: String },
    /// Replace title and content of the document at INDEX
    Edit {
        index: usize,
        title: String,
        content: String,
    },
    /// Delete the document at INDEX
    Delete { index: usize },
}

#[derive(Default)]
struct ErrorPrinter {
    failures: AtomicUsize,
}

impl DocumentsObserver for ErrorPrinter {
    fn on_error(&self, error: &StoreError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        eprintln!("store error: {error}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::Ping = cli.command {
        println!("cloudnote_core ping={}", cloudnote_core::ping());
        println!("cloudnote_core version={}", cloudnote_core::core_version());
        return Ok(());
    }

    let mut config = CoreConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db.clone() {
        config.store.backend = StoreBackend::Sqlite;
        config.store.database_path = Some(db);
    }
    init_logging_from_config(&config.logging)?;
    if config.store.backend == StoreBackend::Memory {
        eprintln!("note: using the in-memory store; pass --db to keep documents");
    }

    let context = Arc::new(QueueContext::new());
    let model = DocumentsModel::new(open_store(&config.store)?, context.clone());
    let errors = Arc::new(ErrorPrinter::default());
    model.subscribe(errors.clone());

    // Indexes refer to the list as `list` prints it, so load it first.
    model.refresh();
    context.run_pending();

    let command = command_name(&cli.command);
    info!("event=cli_command module=cli status=start command={command}");
    match cli.command {
        Command::Ping | Command::List => {}
        Command::Add { title, content } => {
            let document = model.add_document(title, content);
            println!("added {}", document.id());
        }
        Command::Edit {
            index,
            title,
            content,
        } => {
            let record_id = model.update_document(index, title, content)?;
            println!("updated {record_id}");
        }
        Command::Delete { index } => {
            let record_id = model.delete(index)?;
            println!("deleted {record_id}");
        }
    }
    context.run_pending();

    for (index, document) in model.documents().iter().enumerate() {
        println!("{}", render_row(index, document));
    }

    let failures = errors.failures.load(Ordering::SeqCst);
    if failures > 0 {
        error!("event=cli_command module=cli status=error command={command} failures={failures}");
        return Err("one or more store requests failed".into());
    }
    info!("event=cli_command module=cli status=ok command={command}");
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Ping => "ping",
        Command::List => "list",
        Command::Add { .. } => "add",
        Command::Edit { .. } => "edit",
        Command::Delete { .. } => "delete",
    }
}

fn render_row(index: usize, document: &Document) -> String {
    match document.summary() {
        Ok(summary) => {
            let modified = summary
                .modified
                .map(|ms| format!("modified_ms={ms}"))
                .unwrap_or_else(|| "unsaved".to_string());
            format!(
                "{index:>3}  {}  {} bytes  {modified}",
                summary.title, summary.size_bytes
            )
        }
        Err(err) => format!("{index:>3}  <{err}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::{command_name, render_row, Cli};
    use clap::{CommandFactory, Parser};
    use cloudnote_core::Document;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn command_name_matches_subcommand() {
        let cli = Cli::parse_from(["cloudnote", "edit", "2", "Title", "Body"]);
        assert_eq!(command_name(&cli.command), "edit");
        let cli = Cli::parse_from(["cloudnote", "--db", "/tmp/notes.sqlite3", "list"]);
        assert_eq!(command_name(&cli.command), "list");
    }

    #[test]
    fn render_row_shows_size_and_unsaved_state() {
        let document = Document::with_fields("Groceries", "Milk, eggs");
        let row = render_row(0, &document);
        assert!(row.contains("Groceries"));
        assert!(row.contains("10 bytes"));
        assert!(row.contains("unsaved"));
    }

    #[test]
    fn render_row_reports_malformed_documents() {
        let row = render_row(2, &Document::new());
        assert!(row.contains("missing field `title`"));
    }
}
