//! CLI for horde.
//!
//! Manages the announcement event store (`source.json`) and renders the
//! per-audience result files consumed by client applications.

mod request;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use horde_core::{load_static_clients, EventStore, SchemaInspector};
use horde_generator::ResultGenerator;
use request::{AddArgs, RemoveArgs, UsageError};
use std::path::PathBuf;
use std::process::ExitCode;
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    #[command(flatten)]
    paths: Paths,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Paths {
    /// Path to the event store
    #[arg(long, global = true, default_value = "source.json")]
    source: PathBuf,

    /// Path to the list of audiences that always get result files
    #[arg(long, global = true, default_value = "clients.json")]
    clients: PathBuf,

    /// Path to the JSON schema describing the event store
    #[arg(long, global = true, default_value = "schema.json")]
    schema: PathBuf,

    /// Directory the result files are written to
    #[arg(long, global = true, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new event to the store
    Add(AddArgs),
    /// Remove an event by its id
    Remove(RemoveArgs),
    /// Remove every event whose validity window has ended
    Cleanup,
    /// Rewrite the store with consistent formatting
    Format,
    /// Validate the store against the JSON schema
    Validate,
    /// Write the result files for every audience
    Generate,
}

/// Initialize logging with environment-based configuration
fn init_logging() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn handle_add(paths: &Paths, args: AddArgs) -> Result<()> {
    let request = args.into_request()?;

    if !request.channels.is_empty() {
        let allowed = SchemaInspector::new(&paths.schema)
            .allowed_channels()
            .context("Failed to read the allowed channels")?;
        request.check_channels(&allowed)?;
    }

    let event = request.into_event();
    let id = event.id;
    EventStore::new(&paths.source)
        .add(event)
        .context("Failed to create the event")?;

    println!("The event {id} has been successfully added");
    Ok(())
}

fn handle_remove(paths: &Paths, args: RemoveArgs) -> Result<()> {
    let id = args.into_id()?;

    if !EventStore::new(&paths.source).remove(id)? {
        anyhow::bail!("Event with id {} was not found", id);
    }

    println!("The event has been successfully removed");
    Ok(())
}

fn handle_cleanup(paths: &Paths, now: OffsetDateTime) -> Result<()> {
    let removed = EventStore::new(&paths.source).cleanup(now)?;

    if removed > 0 {
        println!("Successfully removed {removed} expired events");
    } else {
        println!("No expired events found");
    }
    Ok(())
}

fn handle_format(paths: &Paths) -> Result<()> {
    EventStore::new(&paths.source).format()?;

    println!(
        "The {} file has been successfully formatted",
        paths.source.display()
    );
    Ok(())
}

fn handle_validate(paths: &Paths) -> Result<()> {
    let violations = SchemaInspector::new(&paths.schema)
        .validate_file(&paths.source)
        .context("There was an error while validating the JSON schema")?;

    if !violations.is_empty() {
        println!("The JSON document is not valid:");
        for violation in &violations {
            println!("- {violation}");
        }
        anyhow::bail!(
            "{} does not match {} ({} violations)",
            paths.source.display(),
            paths.schema.display(),
            violations.len()
        );
    }

    println!("The {} file is valid", paths.source.display());
    Ok(())
}

fn handle_generate(paths: &Paths) -> Result<()> {
    let clients = load_static_clients(&paths.clients)?;
    let events = EventStore::new(&paths.source).load()?;

    ResultGenerator::new(clients, events)
        .with_output_dir(&paths.out_dir)
        .generate()?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let paths = &cli.paths;
    match cli.command {
        Commands::Add(args) => handle_add(paths, args),
        Commands::Remove(args) => handle_remove(paths, args),
        Commands::Cleanup => handle_cleanup(paths, OffsetDateTime::now_utc()),
        Commands::Format => handle_format(paths),
        Commands::Validate => handle_validate(paths),
        Commands::Generate => handle_generate(paths),
    }
}

/// Prints the help of `command`. For `add` the allowed channel names are read
/// from the schema and listed as well.
fn print_usage(paths: &Paths, command: &str) {
    let mut cli = Cli::command();
    cli.build();
    if let Some(sub) = cli.find_subcommand_mut(command) {
        eprintln!("{}", sub.render_help());
    }

    if command == "add" {
        match SchemaInspector::new(&paths.schema).allowed_channels() {
            Ok(channels) if !channels.is_empty() => {
                eprintln!("Allowed channels: {}", channels.join(", "));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not read allowed channels: {}", e),
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Warning: {e:#}");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let paths = cli.paths.clone();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(usage) = e.downcast_ref::<UsageError>() {
                print_usage(&paths, usage.command());
            }
            ExitCode::FAILURE
        }
    }
}
