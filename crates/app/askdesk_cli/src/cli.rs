use askdesk_core::probe::DEFAULT_PROBE_QUESTION;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "askdesk", version, about = "Inspect and query a chat serving endpoint")]
pub struct Cli {
    /// Serving endpoint name, overrides SERVING_ENDPOINT
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print version information
    Version,
    /// Report the endpoint's task type and whether the chat UI supports it
    Check,
    /// Try every request strategy against the endpoint and report which work
    Probe {
        /// Question sent with every strategy
        #[arg(long, default_value = DEFAULT_PROBE_QUESTION)]
        question: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a single question the same way the chat UI does
    Ask {
        question: String,
    },
}
