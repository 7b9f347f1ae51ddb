use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use voxrelay::app::{run_clean, run_pipeline, show_config};
use voxrelay::cli::{Cli, Commands};
use voxrelay::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        None => {
            let work_dir = cli.dir.clone().unwrap_or_else(|| PathBuf::from("."));
            run_pipeline(config, &work_dir).await?;
        }
        Some(Commands::Clean { dir }) => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            run_clean(&dir)?;
        }
        Some(Commands::Config) => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Load configuration and apply environment plus CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = cli.config.as_deref() {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
    };

    let mut config = config.with_env_overrides();

    // CLI flags take precedence over file and environment values
    if let Some(host) = &cli.host {
        config.delivery.host = Some(host.clone());
    }
    if let Some(model) = &cli.model {
        config.recognizer.model = model.clone();
    }
    if let Some(recognizer) = &cli.recognizer {
        config.recognizer.executable = recognizer.clone();
    }
    if let Some(language) = &cli.language {
        config.recognizer.language = language.clone();
    }
    if let Some(duration) = cli.duration {
        config.audio.clip_secs = duration;
    }

    Ok(config)
}
