//! Stakehold CLI - run staking ledger scenarios and inspect their journals.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod scenario;
mod targets;

use commands::{aux, events, run};

#[derive(Parser)]
#[command(name = "stakehold")]
#[command(about = "Staking ledger scenario runner and journal tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a JSON scenario against a fresh in-memory ledger
    Run {
        /// Path to scenario file
        scenario: PathBuf,
        /// Append emitted events to this journal
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
        /// Exit with an error if any step fails
        #[arg(long)]
        strict: bool,
    },
    /// List events in a journal
    Events {
        /// Path to journal file
        journal: PathBuf,
        /// Only events of this kind (repeatable), e.g. stake_changed
        #[arg(long = "kind")]
        kinds: Vec<String>,
        /// Only events involving this account (label or 0x address)
        #[arg(long)]
        account: Option<String>,
        /// Only events emitted by this component (label or 0x address)
        #[arg(long)]
        emitter: Option<String>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
        /// Stop after N matching events
        #[arg(long)]
        max_events: Option<usize>,
        /// Fail on a truncated trailing frame instead of stopping there
        #[arg(long)]
        strict: bool,
    },
    /// Build and inspect auxiliary payloads
    Aux {
        #[command(subcommand)]
        command: AuxCommands,
    },
}

#[derive(Subcommand)]
enum AuxCommands {
    /// Encode ADDRESS=HEX parts into one payload
    Encode {
        /// Parts, in header order
        #[arg(required = true)]
        parts: Vec<String>,
    },
    /// Print the slice of a payload addressed to ADDRESS
    Select {
        /// Hex-encoded payload
        data: String,
        /// Recipient address
        address: String,
    },
    /// Print the header of a payload
    Inspect {
        /// Hex-encoded payload
        data: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scenario,
            journal,
            json,
            strict,
        } => run::run(scenario, journal, json, strict),
        Commands::Events {
            journal,
            kinds,
            account,
            emitter,
            json,
            max_events,
            strict,
        } => events::run(events::EventsArgs {
            journal,
            kinds,
            account,
            emitter,
            json,
            max_events,
            strict,
        }),
        Commands::Aux { command } => match command {
            AuxCommands::Encode { parts } => aux::encode(parts),
            AuxCommands::Select { data, address } => aux::select(data, address),
            AuxCommands::Inspect { data, json } => aux::inspect(data, json),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
