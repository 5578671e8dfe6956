//! Livemix CLI: inspect and dry-run composition manifests.
//!
//! Usage:
//!   livemix validate <MANIFEST>             Parse and validate a manifest
//!   livemix info <MANIFEST>                 Show scenes, elements and outputs
//!   livemix simulate <MANIFEST> [OPTIONS]   Run the mixers on a step clock

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use livemix_common::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "livemix",
    about = "Live scene composition and mixing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a manifest
    Validate {
        /// Path to the manifest JSON
        path: PathBuf,
    },

    /// Show manifest information
    Info {
        /// Path to the manifest JSON
        path: PathBuf,
    },

    /// Drive the composer with synthetic sources on a step clock
    Simulate {
        /// Path to the manifest JSON
        path: PathBuf,

        /// Number of picture frames to run
        #[arg(long, default_value = "30")]
        ticks: u32,

        /// Asset bindings as `asset=element` (repeatable)
        #[arg(long = "bind", value_parser = commands::simulate::parse_binding)]
        bindings: Vec<(String, String)>,

        /// Switch to this scene halfway through
        #[arg(long)]
        switch_to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };
    livemix_common::logging::init_logging_verbose(&config.logging, cli.verbose);

    match cli.command {
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Simulate {
            path,
            ticks,
            bindings,
            switch_to,
        } => commands::simulate::run(path, &config, ticks, bindings, switch_to).await,
    }
}
