use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use tracing_subscriber::EnvFilter;

use polyq::config::Settings;
use polyq::db::Drivers;
use polyq::registry::ConnectionStore;

/// Run query pipelines across PostgreSQL, MongoDB, Redis and jq
#[derive(Parser)]
#[command(name = "polyq", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline. Each argument is one input line; stdin is read when none are given.
    Run {
        lines: Vec<String>,

        /// Maximum rows returned by row-oriented reads
        #[arg(long)]
        max_row_limit: Option<usize>,

        /// Print every stage's metadata and result
        #[arg(long)]
        debug: bool,

        /// Extra `key=value` settings, e.g. `max_row_limit=50`
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
    /// Manage saved connections
    Connections {
        #[command(subcommand)]
        command: ConnectionsCommand,
    },
}

#[derive(Subcommand)]
enum ConnectionsCommand {
    List,
    Add { label: String, uri: String },
    Delete { label: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(err) => {
            println!("Error: {}", err);
            std::process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> Result<String> {
    let store = ConnectionStore::open_default();

    match cli.command {
        Commands::Run {
            lines,
            max_row_limit,
            debug,
            options,
        } => {
            let mut settings = Settings::load()?;
            settings.apply_options(&options)?;
            if let Some(limit) = max_row_limit {
                settings.max_row_limit = limit;
            }
            if debug {
                settings.debug_mode = true;
            }

            let lines = if lines.is_empty() {
                io::stdin().lock().lines().collect::<io::Result<Vec<_>>>()?
            } else {
                polyq::split_legacy_lines(&lines)
            };

            let registry = store.snapshot()?;
            let drivers = Drivers::native();
            Ok(polyq::run_query(&lines, &registry, &drivers, &settings).await?)
        }
        Commands::Connections { command } => match command {
            ConnectionsCommand::List => {
                let entries = store.list()?;
                Ok(entries
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ConnectionsCommand::Add { label, uri } => {
                let entry = store.add(&label, &uri)?;
                Ok(format!("Added {}", entry))
            }
            ConnectionsCommand::Delete { label } => {
                let entry = store.delete(&label)?;
                Ok(format!("Deleted {}", entry))
            }
        },
    }
}
