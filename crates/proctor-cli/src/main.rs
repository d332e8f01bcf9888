//! proctor CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "proctor", version, about = "Multiple-choice exam runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an exam in the terminal
    Take {
        /// Exam identifier
        #[arg(long)]
        exam: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Go straight to the questions without paging through the review slides
        #[arg(long)]
        skip_review: bool,

        /// Print the final result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate exam TOML files
    Validate {
        /// Path to an exam file or directory
        #[arg(long)]
        exam_file: PathBuf,
    },

    /// Create starter config and a sample exam
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proctor=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            exam,
            config,
            skip_review,
            json,
        } => commands::take::execute(exam, config, skip_review, json).await,
        Commands::Validate { exam_file } => commands::validate::execute(exam_file),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
