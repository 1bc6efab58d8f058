//! CLI application for turning OCR invoice text into bookkeeping rows.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{ConfigOverrides, batch, config, process};

/// OCR invoice extraction - Build bookkeeping rows from OCR text files
#[derive(Parser)]
#[command(name = "invex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Escalate incomplete records to the remote extraction service
    #[arg(long, global = true, conflicts_with = "no_ai")]
    ai: bool,

    /// Never escalate, whatever the config file says
    #[arg(long, global = true)]
    no_ai: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every OCR text file in a folder into one spreadsheet
    #[command(alias = "extract")]
    Batch(batch::BatchArgs),

    /// Extract a single OCR text file
    Process(process::ProcessArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let overrides = ConfigOverrides {
        path: cli.config,
        escalation: match (cli.ai, cli.no_ai) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
    };

    match cli.command {
        Commands::Batch(args) => batch::run(args, &overrides).await,
        Commands::Process(args) => process::run(args, &overrides).await,
        Commands::Config(args) => config::run(args, overrides.path.as_deref()).await,
    }
}
