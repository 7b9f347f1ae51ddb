//! Command-line interface for voxrelay
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hands-free speech relay for the local network
#[derive(Parser, Debug)]
#[command(
    name = "voxrelay",
    version = crate::version_string(),
    about = "Record speech, transcribe it offline, relay the text over HTTP"
)]
pub struct Cli {
    /// Subcommand to execute (default: run the relay pipeline)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host receiving recognized text at http://HOST:3000/speech-result
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Path to the whisper.cpp model file
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Path to the whisper-cli binary
    #[arg(long, value_name = "PATH")]
    pub recognizer: Option<PathBuf>,

    /// Language code passed to the recognizer (default: ko)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Clip length in seconds
    #[arg(long, short = 'd', value_name = "SECONDS", value_parser = parse_clip_secs)]
    pub duration: Option<u64>,

    /// Directory for in-flight clip files (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Parse a clip length argument, rejecting zero up front.
fn parse_clip_secs(s: &str) -> Result<u64, String> {
    let secs: u64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if secs == 0 {
        return Err("clip length must be at least 1 second".to_string());
    }
    Ok(secs)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete clip files left behind by an interrupted run
    Clean {
        /// Directory to sweep (default: current directory)
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}
