use std::path::PathBuf;

use clap::{Parser, Subcommand};

use casefile_lib::cli::Command;

#[derive(Parser, Debug)]
#[command(name = "casefile")]
#[command(about = "Re-extract and re-analyze stored case documents")]
struct Args {
    /// Data directory (defaults to the platform's local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reprocess documents in batch
    Reprocess {
        /// Include documents that are already complete
        #[arg(long)]
        all: bool,
        /// Number of concurrent workers
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Reprocess a single document
    ReprocessOne {
        /// Document key, e.g. doc-1234
        id: String,
    },
    /// Import files as new documents
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show how many documents are complete
    Status,
}

fn main() {
    let args = Args::parse();

    let command = match args.command {
        Commands::Reprocess { all, concurrency } => Command::Reprocess {
            failed_only: if all { Some(false) } else { None },
            concurrency,
        },
        Commands::ReprocessOne { id } => Command::ReprocessOne { id },
        Commands::Import { paths } => Command::Import { paths },
        Commands::Status => Command::Status,
    };

    std::process::exit(casefile_lib::cli::run(args.data_dir, command));
}
