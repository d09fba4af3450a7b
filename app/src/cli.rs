//! Command-line entry points.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use casefile_core::{Config, ProgressSnapshot};

use crate::commands::{self, AppState, ReprocessRequest};
use crate::error::CommandError;
use crate::init_logging;

/// A parsed CLI command
#[derive(Debug, Clone)]
pub enum Command {
    Reprocess {
        failed_only: Option<bool>,
        concurrency: Option<usize>,
    },
    ReprocessOne {
        id: String,
    },
    Import {
        paths: Vec<PathBuf>,
    },
    Status,
}

/// Run `command` to completion and return the process exit code
pub fn run(data_dir: Option<PathBuf>, command: Command) -> i32 {
    init_logging(&["casefile=info"]);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    match rt.block_on(execute(data_dir, command)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(code = e.code(), "{}", e);
            print_json(&e);
            1
        }
    }
}

async fn execute(data_dir: Option<PathBuf>, command: Command) -> Result<(), CommandError> {
    let config = match data_dir {
        Some(dir) => Config::with_data_dir(dir),
        None => Config::load_or_default(),
    };
    tracing::debug!("Data directory: {:?}", config.data_dir);

    let state = AppState::new(config)?;

    match command {
        Command::Reprocess {
            failed_only,
            concurrency,
        } => {
            // Ctrl+C stops pulling new documents; in-flight ones still finish
            let ctrl_c_state = state.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, finishing in-flight documents...");
                    commands::cancel_reprocess(&ctrl_c_state).await;
                }
            });

            let request = ReprocessRequest {
                failed_only,
                concurrency,
            };
            let result = commands::reprocess_all(&state, request, Arc::new(log_progress)).await;
            ctrl_c.abort();

            print_json(&result?);
        }
        Command::ReprocessOne { id } => {
            print_json(&commands::reprocess_one(&state, &id).await?);
        }
        Command::Import { paths } => {
            print_json(&commands::import_documents(&state, paths).await?);
        }
        Command::Status => {
            print_json(&commands::store_status(&state).await?);
        }
    }

    Ok(())
}

fn log_progress(snapshot: &ProgressSnapshot) {
    tracing::info!(
        processed = snapshot.processed,
        total = snapshot.total,
        updated = snapshot.updated,
        skipped = snapshot.skipped,
        failed = snapshot.failed,
        doc_id = snapshot.current_id.as_deref().unwrap_or("-"),
        "Progress"
    );
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}
