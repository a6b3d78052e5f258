mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wharf",
    version,
    about = "Exactly-once batch loader for relational warehouses"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate loader configuration and print the resolved retry policy
    Check {
        /// Path to loader YAML file
        config: PathBuf,
    },
    /// Show the statements each batch notification would issue
    Plan {
        /// Path to loader YAML file
        config: PathBuf,
        /// File with one batch notification (JSON) per line
        batches: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Plan { config, batches } => commands::plan::execute(&config, &batches).await,
    }
}
