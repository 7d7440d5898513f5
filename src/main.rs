use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inkvault::{
    AttachmentLedger, AttachmentRepository, Config, Database, NewWorkspace, Note,
    NoteContent, NoteContentPatch, NoteId, NoteOrder, NoteQuery, NoteRepository, NoteStore,
    ResourceId, Synced, WorkspaceId, WorkspacePatch, WorkspaceRepository, WorkspaceStore,
    delete_notes, purge_workspace,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

/// inkvault - workspace notes with attachment tracking
#[derive(Parser)]
#[command(name = "inkvault")]
#[command(about = "Workspace-scoped notes with attachment reference tracking")]
#[command(version)]
struct Cli {
    /// Profile database file (overrides INKVAULT_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create, list, rename and delete workspaces
    #[command(subcommand)]
    Workspace(WorkspaceCommand),

    /// Manage the notes of a workspace
    #[command(subcommand)]
    Note(NoteCommand),

    /// Track which resources a note references
    #[command(subcommand)]
    Attach(AttachCommand),
}

#[derive(Subcommand)]
enum WorkspaceCommand {
    /// Create a workspace
    Create {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List workspaces in creation order
    List,
    /// Rename a workspace
    Rename {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Delete workspaces
    Delete {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,

        /// Also delete the workspace's notes and attachment references
        #[arg(long)]
        purge: bool,
    },
}

/// Workspace the command operates on
#[derive(Args)]
struct WorkspaceArg {
    #[arg(short, long, value_name = "WORKSPACE")]
    workspace: String,
}

impl WorkspaceArg {
    fn id(&self) -> WorkspaceId {
        WorkspaceId::new(self.workspace.as_str())
    }
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Add a note
    Add {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(value_name = "TEXT", default_value = "")]
        text: String,
    },
    /// List notes, optionally one page at a time
    List {
        #[command(flatten)]
        scope: WorkspaceArg,
        /// 1-indexed page number (requires --limit)
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, value_enum, default_value_t = OrderArg::Inserted)]
        order: OrderArg,
    },
    /// Show one note
    Show {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Change the title or text of a note
    Edit {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "ID")]
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Delete notes
    Delete {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },
    /// Count notes
    Count {
        #[command(flatten)]
        scope: WorkspaceArg,
    },
}

#[derive(Subcommand)]
enum AttachCommand {
    /// Replace the resources a note references
    Set {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "NOTE")]
        note: String,
        #[arg(value_name = "RESOURCE")]
        resources: Vec<String>,
    },
    /// List the resources a note references
    Get {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "NOTE")]
        note: String,
    },
    /// List the notes that reference a resource
    Targets {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "RESOURCE")]
        resource: String,
    },
    /// Print the given resources that no note references
    Orphans {
        #[command(flatten)]
        scope: WorkspaceArg,
        #[arg(value_name = "RESOURCE", required = true)]
        resources: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    /// Insertion order
    Inserted,
    /// Most recently updated first
    Updated,
}

impl From<OrderArg> for NoteOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Inserted => NoteOrder::Inserted,
            OrderArg::Updated => NoteOrder::Updated,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load();
    init_tracing(&config.log_filter);

    let result = open_database(cli.db.as_deref(), &config).and_then(|db| run(&cli, &db));

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the configured
/// filter.
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Determines if an error is a user error (vs internal error).
///
/// Unknown ids and invalid arguments are user errors. Storage, migration and
/// sync failures are internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<inkvault::Error>())
        .is_some_and(inkvault::Error::is_user_error)
}

fn run(cli: &Cli, db: &Database) -> Result<()> {
    match &cli.command {
        Commands::Workspace(cmd) => run_workspace(cmd, db, cli.json),
        Commands::Note(cmd) => run_note(cmd, db, cli.json),
        Commands::Attach(cmd) => run_attach(cmd, db, cli.json),
    }
}

fn run_workspace(cmd: &WorkspaceCommand, db: &Database, json: bool) -> Result<()> {
    let workspaces = Synced::new(WorkspaceStore::new(db), db);

    match cmd {
        WorkspaceCommand::Create { name } => {
            let id = workspaces
                .create(NewWorkspace::new(name.as_str()))
                .context("Failed to create workspace")?;
            if json {
                print_json(&serde_json::json!({ "id": id }))
            } else {
                println!("Workspace created (id: {id})");
                Ok(())
            }
        }
        WorkspaceCommand::List => {
            let list = workspaces.get_list()?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No workspaces");
            }
            for workspace in list {
                println!("{}  {}", workspace.id, workspace.name);
            }
            Ok(())
        }
        WorkspaceCommand::Rename { id, name } => {
            workspaces
                .update(
                    &WorkspaceId::new(id.as_str()),
                    WorkspacePatch::rename(name.as_str()),
                )
                .context("Failed to rename workspace")?;
            if !json {
                println!("Workspace renamed");
            }
            Ok(())
        }
        WorkspaceCommand::Delete { ids, purge } => {
            let ids: Vec<WorkspaceId> = ids.iter().map(|id| WorkspaceId::new(id.as_str())).collect();
            if *purge {
                let mut reports = Vec::with_capacity(ids.len());
                for id in &ids {
                    let report = purge_workspace(db, id, Some(db))
                        .with_context(|| format!("Failed to purge workspace {id}"))?;
                    if !json {
                        println!(
                            "Purged workspace {id}: {} notes, {} attachment references",
                            report.notes_deleted, report.attachments_deleted
                        );
                    }
                    reports.push(report);
                }
                if json {
                    let summary: Vec<_> = ids
                        .iter()
                        .zip(&reports)
                        .map(|(id, report)| {
                            serde_json::json!({
                                "id": id,
                                "workspace_deleted": report.workspace_deleted,
                                "notes_deleted": report.notes_deleted,
                                "attachments_deleted": report.attachments_deleted,
                                "released_resources": report.released_resources,
                            })
                        })
                        .collect();
                    return print_json(&summary);
                }
                return Ok(());
            }

            workspaces
                .delete(&ids)
                .context("Failed to delete workspaces")?;
            if !json {
                println!("Deleted {} workspace(s)", ids.len());
            }
            Ok(())
        }
    }
}

fn run_note(cmd: &NoteCommand, db: &Database, json: bool) -> Result<()> {
    match cmd {
        NoteCommand::Add { scope, title, text } => {
            let notes = Synced::new(NoteStore::new(db, scope.id()), db);
            let id = notes
                .add(NoteContent::new(title.as_str(), text.as_str()))
                .context("Failed to create note")?;
            if json {
                print_json(&serde_json::json!({ "id": id }))
            } else {
                println!("Note created (id: {id})");
                Ok(())
            }
        }
        NoteCommand::List {
            scope,
            page,
            limit,
            order,
        } => {
            let notes = NoteStore::new(db, scope.id());
            let query = NoteQuery {
                page: *page,
                limit: *limit,
                order: (*order).into(),
            };
            let list = notes.get(query)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No notes");
            }
            for note in &list {
                println!("{}", format_note_line(note)?);
            }
            Ok(())
        }
        NoteCommand::Show { scope, id } => {
            let notes = NoteStore::new(db, scope.id());
            let id = NoteId::new(id.as_str());
            let note = notes
                .get_by_id(&id)?
                .ok_or_else(|| inkvault::Error::NotFound {
                    entity: "note",
                    id: id.to_string(),
                })?;
            if json {
                return print_json(&note);
            }
            println!("id:      {}", note.id());
            println!("created: {}", note.created_at().format(&Rfc3339)?);
            println!("updated: {}", note.updated_at().format(&Rfc3339)?);
            println!("title:   {}", note.content().title);
            println!();
            println!("{}", note.content().text);
            Ok(())
        }
        NoteCommand::Edit {
            scope,
            id,
            title,
            text,
        } => {
            let patch = edit_patch(title.clone(), text.clone())?;
            let notes = Synced::new(NoteStore::new(db, scope.id()), db);
            notes
                .update(&NoteId::new(id.as_str()), patch)
                .context("Failed to edit note")?;
            if !json {
                println!("Note updated");
            }
            Ok(())
        }
        NoteCommand::Delete { scope, ids } => {
            let ids: Vec<NoteId> = ids.iter().map(|id| NoteId::new(id.as_str())).collect();
            let released =
                delete_notes(db, &scope.id(), &ids, Some(db)).context("Failed to delete notes")?;
            if json {
                return print_json(&serde_json::json!({
                    "deleted": ids,
                    "released_resources": released,
                }));
            }
            println!(
                "Deleted {} note(s), released {} resource(s)",
                ids.len(),
                released.len()
            );
            Ok(())
        }
        NoteCommand::Count { scope } => {
            let count = NoteStore::new(db, scope.id()).get_length()?;
            if json {
                print_json(&serde_json::json!({ "count": count }))
            } else {
                println!("{count}");
                Ok(())
            }
        }
    }
}

fn run_attach(cmd: &AttachCommand, db: &Database, json: bool) -> Result<()> {
    match cmd {
        AttachCommand::Set {
            scope,
            note,
            resources,
        } => {
            let ledger = Synced::new(AttachmentLedger::new(db, scope.id()), db);
            let resources = resource_ids(resources);
            ledger
                .set(&NoteId::new(note.as_str()), &resources)
                .context("Failed to set attachments")?;
            if !json {
                println!("Note {note} references {} resource(s)", resources.len());
            }
            Ok(())
        }
        AttachCommand::Get { scope, note } => {
            let ledger = AttachmentLedger::new(db, scope.id());
            let note = NoteId::new(note.as_str());
            if json {
                return print_json(&ledger.references(&note)?);
            }
            print_ids(&ledger.get(&note)?, json)
        }
        AttachCommand::Targets { scope, resource } => {
            let targets = AttachmentLedger::new(db, scope.id())
                .get_targets(&ResourceId::new(resource.as_str()))?;
            if json {
                return print_json(&targets);
            }
            for note in targets {
                println!("{note}");
            }
            Ok(())
        }
        AttachCommand::Orphans { scope, resources } => {
            let orphans = AttachmentLedger::new(db, scope.id())
                .find_orphaned_resources(&resource_ids(resources))?;
            print_ids(&orphans, json)
        }
    }
}

/// Builds the patch for `note edit`, rejecting an edit that changes nothing.
fn edit_patch(title: Option<String>, text: Option<String>) -> Result<NoteContentPatch> {
    let patch = NoteContentPatch { title, text };
    if patch.is_empty() {
        return Err(inkvault::Error::InvalidArgument(
            "nothing to edit: pass --title or --text".to_string(),
        )
        .into());
    }
    Ok(patch)
}

fn resource_ids(raw: &[String]) -> Vec<ResourceId> {
    raw.iter().map(|id| ResourceId::new(id.as_str())).collect()
}

fn format_note_line(note: &Note) -> Result<String> {
    Ok(format!(
        "{}  {}  {}",
        note.id(),
        note.updated_at().format(&Rfc3339)?,
        note.content().title
    ))
}

fn print_ids(ids: &[ResourceId], json: bool) -> Result<()> {
    if json {
        return print_json(ids);
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Opens the profile database, preferring `--db` over the configured path.
fn open_database(cli_path: Option<&Path>, config: &Config) -> Result<Database> {
    let db_path = match cli_path {
        Some(path) => path.to_path_buf(),
        None => get_database_path(config)?,
    };
    ensure_database_directory(&db_path)?;

    Database::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

/// Gets the configured database path.
///
/// Falls back to `{data_dir}/inkvault/profile.db` unless `INKVAULT_DB_PATH`
/// is set.
fn get_database_path(config: &Config) -> Result<PathBuf> {
    config
        .db_path
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))
}

/// Ensures the parent directory of the database file exists.
fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
