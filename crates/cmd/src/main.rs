use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(author, version, about = "Batch loads from the object store into the warehouse", long_about = None)]
#[command(name = "sluice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process unmarked input objects and load them into the warehouse
    Run {
        /// Feed configuration file (JSON)
        config: PathBuf,
    },
    /// List what the next run would process, without touching anything
    Scan {
        /// Feed configuration file (JSON)
        config: PathBuf,
    },
}

fn main() {
    diagnostics::init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run { config } => commands::run::execute(config),
        Commands::Scan { config } => commands::scan::execute(config),
    };

    // The exit code is the only machine-readable signal to the scheduler
    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sluice: {err:#}");
            std::process::exit(1);
        }
    }
}
