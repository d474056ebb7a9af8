use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `callgate` - token proxy for the embeddable voice-agent widget.
#[derive(Parser, Debug)]
#[command(name = "callgate")]
#[command(version)]
#[command(about = "Token proxy and origin policy for the voice-agent widget.", long_about = None)]
pub struct Cli {
    /// Optional TOML config file (defaults and environment variables apply without it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the proxy server
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Show how the configured origin policy treats an origin
    CheckOrigin {
        /// Origin to evaluate, e.g. `https://app.example.com` (omit for a request without one)
        origin: Option<String>,
    },
}
