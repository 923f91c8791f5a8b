//! ctx-store CLI - operator interface to an event-sourced context store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use ctx_store::StoreError;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ctx-store")]
#[command(about = "Durable, crash-safe context tracking for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a store root
    Init,
    /// Create a new context
    Create {
        /// Free-form summary
        summary: String,
        /// Explicit id (generated from the summary if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Workflow that owns the context
        #[arg(short, long, default_value = "manual")]
        method: String,
        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// List contexts, most recently active first
    List {
        /// Only show contexts with this status (active, completed)
        #[arg(short, long)]
        status: Option<String>,
        /// Only show contexts owned by this workflow
        #[arg(short, long)]
        method: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one context with its tasks and notes
    Show {
        /// Context id
        id: String,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update summary, tags or method
    Update {
        /// Context id
        id: String,
        #[arg(long)]
        summary: Option<String>,
        /// Replacement tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long)]
        method: Option<String>,
    },
    /// Complete a context and move it to the archive
    Complete {
        /// Context id
        id: String,
    },
    /// Reopen a completed context, restoring it from the archive
    Reopen {
        /// Context id
        id: String,
    },
    /// Archive an already completed context
    Archive {
        /// Context id
        id: String,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Append a note to a context
    Note {
        /// Context id
        id: String,
        /// The note text
        text: String,
    },
    /// Plan lifecycle transitions
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Handoff overlay transitions
    Handoff {
        #[command(subcommand)]
        command: HandoffCommands,
    },
    /// Host session binding
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Print the raw event log of a context
    Events {
        /// Context id
        id: String,
        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Rebuild every cache from the event logs
    Rebuild,
    /// Compare caches against the event logs without changing anything
    Verify,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        /// Context id
        id: String,
        /// Caller-assigned task id
        task_id: String,
        /// Short subject line
        subject: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Present-continuous form shown while in progress
        #[arg(long)]
        active_form: Option<String>,
    },
    /// Mark a task in progress
    Start {
        /// Context id
        id: String,
        task_id: String,
    },
    /// Mark a task completed
    Complete {
        /// Context id
        id: String,
        task_id: String,
        /// How completion was verified
        #[arg(short, long)]
        evidence: Option<String>,
        /// What was done
        #[arg(short, long)]
        summary: Option<String>,
        /// Files touched (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        files: Vec<String>,
    },
    /// Mark a task blocked
    Block {
        /// Context id
        id: String,
        task_id: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List tasks of a context
    List {
        /// Context id
        id: String,
        /// Only tasks that are not completed
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Enter planning
    Start {
        /// Context id
        id: String,
        /// Session doing the planning
        #[arg(long)]
        session: Option<String>,
    },
    /// Archive a plan document and await implementation
    Record {
        /// Context id
        id: String,
        /// Plan document to archive
        file: PathBuf,
    },
    /// Start implementing the recorded plan
    Implement {
        /// Context id
        id: String,
    },
    /// Finish the plan cycle
    Complete {
        /// Context id
        id: String,
    },
}

#[derive(Subcommand)]
enum HandoffCommands {
    /// Record a handoff document
    Create {
        /// Context id
        id: String,
        /// Handoff document path
        path: String,
    },
    /// Clear the pending handoff
    Clear {
        /// Context id
        id: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Bind a host session to a context
    Bind {
        /// Context id
        id: String,
        /// Session id
        session_id: String,
    },
    /// Find the active context bound to a session
    Find {
        /// Session id
        session_id: String,
    },
    /// List active contexts with work in flight
    InFlight,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = dispatch(cli);

    if let Err(e) = &result {
        if let Some(hint) = e
            .downcast_ref::<StoreError>()
            .and_then(StoreError::recovery_suggestion)
        {
            eprintln!("{} {}", style("hint:").yellow().bold(), hint);
        }
    }
    result
}

fn dispatch(cli: Cli) -> Result<()> {
    let root = cli.root.as_path();

    match cli.command {
        Commands::Init => commands::init::run(root),
        Commands::Create {
            summary,
            id,
            method,
            tags,
        } => commands::context::create(root, id.as_deref(), &summary, &method, &tags),
        Commands::List {
            status,
            method,
            json,
        } => commands::context::list(root, status.as_deref(), method.as_deref(), json),
        Commands::Show { id, json } => commands::context::show(root, &id, json),
        Commands::Update {
            id,
            summary,
            tags,
            method,
        } => commands::context::update(
            root,
            &id,
            summary.as_deref(),
            tags.as_deref(),
            method.as_deref(),
        ),
        Commands::Complete { id } => commands::context::complete(root, &id),
        Commands::Reopen { id } => commands::context::reopen(root, &id),
        Commands::Archive { id } => commands::context::archive(root, &id),
        Commands::Task { command } => match command {
            TaskCommands::Add {
                id,
                task_id,
                subject,
                description,
                active_form,
            } => commands::task::add(
                root,
                &id,
                &task_id,
                &subject,
                description.as_deref(),
                active_form.as_deref(),
            ),
            TaskCommands::Start { id, task_id } => commands::task::start(root, &id, &task_id),
            TaskCommands::Complete {
                id,
                task_id,
                evidence,
                summary,
                files,
            } => commands::task::complete(root, &id, &task_id, evidence, summary, files),
            TaskCommands::Block {
                id,
                task_id,
                reason,
            } => commands::task::block(root, &id, &task_id, reason.as_deref()),
            TaskCommands::List { id, pending } => commands::task::list(root, &id, pending),
        },
        Commands::Note { id, text } => commands::task::note(root, &id, &text),
        Commands::Plan { command } => match command {
            PlanCommands::Start { id, session } => {
                commands::plan::start(root, &id, session.as_deref())
            }
            PlanCommands::Record { id, file } => commands::plan::record(root, &id, &file),
            PlanCommands::Implement { id } => commands::plan::implement(root, &id),
            PlanCommands::Complete { id } => commands::plan::complete(root, &id),
        },
        Commands::Handoff { command } => match command {
            HandoffCommands::Create { id, path } => commands::plan::handoff_create(root, &id, &path),
            HandoffCommands::Clear { id } => commands::plan::handoff_clear(root, &id),
        },
        Commands::Session { command } => match command {
            SessionCommands::Bind { id, session_id } => {
                commands::session::bind(root, &id, &session_id)
            }
            SessionCommands::Find { session_id } => commands::session::find(root, &session_id),
            SessionCommands::InFlight => commands::session::in_flight(root),
        },
        Commands::Events { id, json } => commands::events::run(root, &id, json),
        Commands::Rebuild => commands::rebuild::run(root),
        Commands::Verify => commands::verify::run(root),
    }
}
