//! Lightstack CLI
//!
//! Command-line entry point for the Lightstack controller.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lightstack::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    info!("Lightstack v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref(), cli.storage.as_deref())
        .context("failed to load configuration")?;

    let Some(cmd) = cli.command else {
        println!("Lightstack v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    match cmd {
        Commands::Run { frames, control } => {
            commands::run(config, frames, control).context("controller failed")?
        }
        Commands::Preview { frames } => commands::preview(config, frames).context("preview failed")?,
        Commands::AddAudio { ref name } => commands::add_audio(config, name)
            .with_context(|| format!("failed to add audio source '{}'", name))?,
        other => {
            let request = other
                .control_request()
                .context("command has no control request")?;
            commands::control(config, request).context("control request failed")?
        }
    }
    Ok(())
}
