//! Wikigraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "wikigraph")]
#[command(about = "Live link graph of a folder of wiki-linked notes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Corpus root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the graph server and watch the corpus
    Serve {
        /// Port to listen on (overrides wikigraph.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides wikigraph.toml)
        #[arg(long)]
        host: Option<String>,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,
    },
    /// Index the corpus and print the graph export
    Export {
        /// Export the neighborhood of this document instead of the whole corpus
        #[arg(long)]
        local: Option<String>,

        /// Keep only nodes matching `filename:<text>`, `path:<text>` or bare text
        #[arg(long)]
        search: Option<String>,

        /// Leave out forward links
        #[arg(long)]
        no_forward: bool,

        /// Leave out back-links
        #[arg(long)]
        no_backward: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report unresolved links and ambiguous names
    Check,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wikigraph={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Wikigraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Corpus root: {}", cli.root.display());

    match cli.command {
        Commands::Serve { port, host, open } => commands::serve(cli.root, host, port, open).await,
        Commands::Export {
            local,
            search,
            no_forward,
            no_backward,
            output,
        } => {
            let request = commands::ExportRequest {
                local,
                search,
                forward_links: !no_forward,
                backward_links: !no_backward,
            };
            commands::export(cli.root, request, output).await
        }
        Commands::Check => commands::check(cli.root).await,
        Commands::Version => {
            println!("Wikigraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
