//! Relay CLI
//!
//! Lowers resolved state-machine programs (JSON) into resumable entry
//! routines, then prints, verifies, or runs the result.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay lowering toolchain", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a program and print the entry routines
    Lower {
        /// Program file (JSON)
        file: PathBuf,
        /// Configuration file (defaults to ./relay.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Only lower the named function
        #[arg(short, long)]
        function: Option<String>,
    },

    /// Lower and verify a program without printing it
    Check {
        /// Program file (JSON)
        file: PathBuf,
        /// Configuration file (defaults to ./relay.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run one function on a fresh actor under every nondet choice
    Run {
        /// Program file (JSON)
        file: PathBuf,
        /// Machine type the actor instantiates
        #[arg(short, long)]
        machine: String,
        /// Function to run
        #[arg(short, long)]
        function: String,
        /// Configuration file (defaults to ./relay.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Give up once this many branches exist
        #[arg(long, default_value_t = 256)]
        max_branches: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Lower { file, config, function } => {
            commands::lower::execute(&file, config.as_deref(), function.as_deref())
        }
        Commands::Check { file, config } => commands::check::execute(&file, config.as_deref()),
        Commands::Run {
            file,
            machine,
            function,
            config,
            max_branches,
        } => commands::run::execute(&file, config.as_deref(), &machine, &function, max_branches),
    }
}
