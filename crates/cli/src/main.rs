mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hal_dmr::{DispatchOutcome, Dispatcher, RunState, UploadFile};
use tracing::{debug, warn};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = cli.dispatch_config()?;
    let dispatcher = Dispatcher::from_config(&config).context("failed to set up the dispatcher")?;
    let operation = cli.operation(&cli.selection_context())?;
    debug!(%operation, base_url = %config.base_url, "running operation");

    let mut process_states = dispatcher.events().subscribe();
    let outcome = match &cli.command {
        Command::Upload { file, field, .. } => {
            let upload = UploadFile::from_path(field.as_str(), file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            dispatcher.dispatch_upload(upload, &operation).await
        }
        _ => dispatcher.dispatch(&operation).await,
    };

    // States are published before the outcome is returned.
    while let Ok(process_state) = process_states.try_recv() {
        let summary = process_state.summary();
        if summary != RunState::Running {
            warn!(state = %summary, servers = process_state.servers.len(), "servers need attention");
        }
    }

    match outcome {
        DispatchOutcome::Success(result) => {
            println!("{}", result.to_json_string(false));
            Ok(())
        }
        DispatchOutcome::Failed { operation, failure } => bail!("operation {operation} failed: {failure}"),
        DispatchOutcome::Exception { operation, error } => {
            Err(error).with_context(|| format!("operation {operation} could not be dispatched"))
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
