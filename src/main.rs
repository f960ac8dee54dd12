use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wafermind::config::ConfigLoader;

#[derive(Parser)]
#[command(name = "wafermind")]
#[command(
    version,
    about = "Retrieval-augmented knowledge base for semiconductor process documentation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Path to a config file overriding the default chain")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest parsed-block files into the knowledge base
    Ingest {
        #[arg(required = true, help = "Parsed block files (JSON arrays) to ingest")]
        files: Vec<PathBuf>,
    },

    /// Answer a question over ingested documents
    Query {
        #[arg(help = "The question to answer")]
        question: String,
        #[arg(
            long,
            help = "Parsed block files to ingest into this session before answering"
        )]
        blocks: Vec<PathBuf>,
        #[arg(long, help = "Emit the full outcome as JSON")]
        json: bool,
    },

    /// Show registered documents and graph statistics
    Status,

    /// Show the effective configuration (merged from all sources)
    Config {
        #[arg(long, help = "Emit JSON instead of TOML")]
        json: bool,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Ingest { files } => {
            runtime.block_on(wafermind::cli::commands::ingest::run(&config, &files))?;
        }
        Commands::Query {
            question,
            blocks,
            json,
        } => {
            runtime.block_on(wafermind::cli::commands::query::run(
                &config, &question, &blocks, json,
            ))?;
        }
        Commands::Status => {
            runtime.block_on(wafermind::cli::commands::status::run(&config))?;
        }
        Commands::Config { json } => {
            println!("{}", ConfigLoader::render(&config, json)?);
        }
    }

    Ok(())
}
