//! Indexsync CLI - Replay repository change events and inspect the index

mod replay;

use clap::{Parser, Subcommand};
use indexsync_core::{
    open_store, CatalogRepository, Config, Dispatcher, ErrorEnvelope, SyncError, TypeCollection,
};
use replay::{ReplayOptions, ReplaySummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "indexsync")]
#[command(about = "Keep a search index in step with repository change events", long_about = None)]
struct Cli {
    /// Config file
    #[arg(long, global = true, env = "INDEXSYNC_CONFIG", default_value = "indexsync.toml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Dispatch a newline-delimited JSON event log
    Replay {
        /// File of {"routing_key": ..., "event": {...}} records
        file: PathBuf,

        /// Dispatch one event at a time, in file order
        #[arg(long)]
        sequential: bool,
    },

    /// Print a stored document
    Show {
        /// Document id (the repository path)
        id: String,

        /// Type collection to look in (both if omitted)
        #[arg(long, value_parser = ["folder", "file"])]
        kind: Option<String>,
    },

    /// Show document counts
    Status,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => cmd_init(&cli.config, force, cli.json),
        Commands::Replay { file, sequential } => {
            cmd_replay(&cli.config, &file, sequential, cli.json)
        }
        Commands::Show { id, kind } => cmd_show(&cli.config, &id, kind.as_deref(), cli.json),
        Commands::Status => cmd_status(&cli.config, cli.json),
    };

    if let Err(e) = result {
        if cli.json {
            let envelope = ErrorEnvelope::from(&e);
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| e.to_string())
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

/// Load the config (defaults if the file is absent) and start logging
fn load_config(path: &Path) -> indexsync_core::Result<Config> {
    let config = Config::load_or_default(path)?;
    init_tracing(&config.logging.filter);
    Ok(config)
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> indexsync_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(path: &Path, force: bool, json: bool) -> indexsync_core::Result<()> {
    use colored::Colorize;

    Config::write_default(path, force)?;
    if json {
        print_json(&serde_json::json!({ "created": path.display().to_string() }))
    } else {
        println!("{} {}", "Created".green(), path.display());
        Ok(())
    }
}

fn cmd_replay(
    config_path: &Path,
    file: &Path,
    sequential: bool,
    json: bool,
) -> indexsync_core::Result<()> {
    use colored::Colorize;

    let config = load_config(config_path)?;
    let input = std::io::BufReader::new(std::fs::File::open(file)?);
    let store = open_store(&config.store)?;
    let dispatcher = Dispatcher::new(CatalogRepository, config.repository.clone(), store);

    let options = ReplayOptions {
        workers: config.consumer.workers,
        queue_capacity: config.consumer.queue_capacity,
        sequential,
    };
    let summary: ReplaySummary = replay::replay(&dispatcher, input, options)?;

    if json {
        return print_json(&summary);
    }

    println!("{}: {} records", "Replayed".green(), summary.records);
    println!("  {}: {}", "handled".blue(), summary.handled);
    println!("  {}: {}", "ignored".blue(), summary.ignored);
    println!("  {}: {}", "unrecognized".yellow(), summary.unrecognized);
    if summary.failed > 0 {
        println!("  {}: {}", "failed".red(), summary.failed);
    }
    if summary.malformed > 0 {
        println!("  {}: {} lines skipped", "malformed".red(), summary.malformed);
    }
    Ok(())
}

fn cmd_show(
    config_path: &Path,
    id: &str,
    kind: Option<&str>,
    json: bool,
) -> indexsync_core::Result<()> {
    use colored::Colorize;

    let config = load_config(config_path)?;
    let store = open_store(&config.store)?;
    let kinds: Vec<TypeCollection> = match kind.and_then(TypeCollection::parse) {
        Some(kind) => vec![kind],
        None => TypeCollection::ALL.to_vec(),
    };

    for kind in kinds {
        if let Some(doc) = store.get(kind, id)? {
            if json {
                return print_json(&serde_json::json!({ "kind": kind, "document": doc }));
            }
            println!("{} {}", kind.as_str().cyan(), id.bold());
            println!("{}", serde_json::to_string_pretty(&doc)?);
            return Ok(());
        }
    }

    Err(SyncError::DocumentNotFound {
        kind: kind.and_then(TypeCollection::parse).map_or("any", TypeCollection::as_str),
        id: id.to_string(),
    })
}

#[derive(Serialize)]
struct StoreStatus {
    backend: String,
    folders: u64,
    files: u64,
}

fn cmd_status(config_path: &Path, json: bool) -> indexsync_core::Result<()> {
    use colored::Colorize;

    let config = load_config(config_path)?;
    let store = open_store(&config.store)?;
    let status = StoreStatus {
        backend: match config.store.backend {
            indexsync_core::config::StoreBackend::Sqlite => config.store.path.display().to_string(),
            indexsync_core::config::StoreBackend::Http => {
                format!("{}/{}", config.store.url.trim_end_matches('/'), config.store.index)
            }
        },
        folders: store.count(TypeCollection::Folder)?,
        files: store.count(TypeCollection::File)?,
    };

    if json {
        return print_json(&status);
    }
    println!("{}: {}", "Store".blue(), status.backend);
    println!("{}: {}", "Folders".blue(), status.folders);
    println!("{}: {}", "Files".blue(), status.files);
    Ok(())
}
