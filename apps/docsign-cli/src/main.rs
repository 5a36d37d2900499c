//! DocSign command-line client
//!
//! Reviews and signs documents held by the persistence API, and manages the
//! local signature vault and placement drafts.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "docsign")]
#[command(version, about = "Review and sign documents from the command line")]
struct Cli {
    /// TOML configuration file; DOCSIGN_* environment variables are used
    /// when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the signature vault and placement drafts
    #[arg(long, global = true, env = "DOCSIGN_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show status, participants, and the actions open to you
    Show { id: String },

    /// Assign the reviewer of a document that is ready for review
    AssignReviewer { id: String, email: String },

    /// Approve a document you are reviewing
    Approve { id: String },

    /// Sign a document with a PNG image or a saved signature
    Sign {
        id: String,

        /// PNG file holding the signature
        #[arg(long, required_unless_present = "saved", conflicts_with = "saved")]
        image: Option<PathBuf>,

        /// Id of a signature in the local vault
        #[arg(long)]
        saved: Option<String>,

        /// Reduce a photographed signature to black ink on white first
        #[arg(long)]
        extract: bool,
    },

    /// Reject a document with a reason
    Reject {
        id: String,

        #[arg(long)]
        reason: String,
    },

    /// Tell the server you have opened the document
    MarkViewed { id: String },

    /// Manage locally saved signatures
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },

    /// Reduce a PNG to black ink on white
    Extract { input: PathBuf, output: PathBuf },

    /// Add a signature field for an assignee to the local placement draft
    Place {
        id: String,

        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        name: String,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Move by this many page pixels after placing
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dx: f64,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dy: f64,

        /// Grow by this many page pixels after placing
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dw: f64,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        dh: f64,
    },

    /// Submit the local placement draft of a document
    CompletePlacement { id: String },
}

#[derive(Subcommand, Debug)]
enum VaultCommand {
    List,

    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        image: PathBuf,

        #[arg(long)]
        extract: bool,
    },

    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // stdout carries command output, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("docsign=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    commands::run(cli).await
}
