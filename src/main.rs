//! Main entry point for the docbridge CLI application.
//!
//! The binary plays both roles: a blocking worker thread issues the engine's
//! file call, while an async task stands in for the host UI and answers the
//! picker on the terminal.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use docbridge::cli::Command;
use docbridge::host::{ChannelPicker, Chooser, FixedChooser, HostUi, PromptChooser};
use docbridge::{Cli, HttpDocumentStore, LogNotifier, RequestBridge, SchemeStore};

/// What the worker thread hands back to main.
enum Outcome {
    Saved,
    Loaded(Vec<u8>),
    Extracted(docbridge::ExtractSummary),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Read save data up front; the prompt chooser needs stdin afterwards
    let payload = match &cli.command {
        Command::Save { input: Some(path), .. } => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        Command::Save { input: None, .. } => {
            if cli.pick.is_none() && !cli.cancel {
                bail!("save from stdin needs --pick or --cancel, stdin is used for prompting");
            }
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            Some(data)
        }
        _ => None,
    };

    let chooser: Arc<dyn Chooser> = match (&cli.pick, cli.cancel) {
        (Some(handle), _) => Arc::new(FixedChooser::approve(handle.clone())),
        (None, true) => Arc::new(FixedChooser::cancel()),
        (None, false) => Arc::new(PromptChooser::new()),
    };

    let store = SchemeStore::with_http(HttpDocumentStore::new(tokio::runtime::Handle::current())?);
    let (picker, requests) = ChannelPicker::channel();
    let bridge = RequestBridge::new(
        cli.bridge_config(),
        Arc::new(picker),
        Arc::new(store),
        Arc::new(LogNotifier::new()),
    );

    let host = tokio::spawn(HostUi::new(chooser, bridge.completion_sink()).run(requests));

    let output = match &cli.command {
        Command::Load { output, .. } => output.clone(),
        _ => None,
    };
    let quiet = cli.is_quiet();
    let command = cli.command;

    // The engine side: one blocking call on a worker thread. Dropping the
    // bridge afterwards closes the picker channel and lets the host finish.
    let outcome = tokio::task::spawn_blocking(move || -> Result<Outcome> {
        match command {
            Command::Save { name, .. } => {
                bridge.request_save(&name, payload.unwrap_or_default())?;
                Ok(Outcome::Saved)
            }
            Command::Load { prompt, mime, .. } => Ok(Outcome::Loaded(bridge.request_load(&prompt, &mime)?)),
            Command::Unzip { destination, prompt } => Ok(Outcome::Extracted(
                bridge.request_extract_archive(&prompt, &destination)?,
            )),
        }
    })
    .await?;

    // Saves complete on the host side, so wait for it before exiting
    let served = host.await??;
    tracing::debug!(served, "host UI finished");

    match outcome? {
        Outcome::Saved => {}
        Outcome::Loaded(bytes) => match output {
            Some(path) => tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?,
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&bytes).await?;
                stdout.flush().await?;
            }
        },
        Outcome::Extracted(summary) => {
            if !quiet {
                eprintln!(
                    "extracted {} files and {} directories ({} bytes)",
                    summary.files, summary.directories, summary.bytes_written
                );
            }
        }
    }

    Ok(())
}
